//! Error types for the settlement contracts.
//!
//! Every public operation on the desk, the vault, or the engine returns a
//! [`SettlementError`]. Each variant names the invariant that blocked the
//! operation; there is no catch-all. Lower-level errors from the ledgers,
//! the access tables, and the voucher verifier convert into it with `?`.

use reserve_protocol::access::{AccessError, Role};
use reserve_protocol::ledger::{AccountId, AssetId, LedgerError};
use thiserror::Error;

use crate::authorization::AuthorizationError;
use crate::credit_ledger::CreditLedgerError;

/// Result alias used throughout the contracts crate.
pub type SettlementResult<T> = Result<T, SettlementError>;

/// Errors raised by settlement operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// The payment asset has no active (non-zero) price.
    #[error("unsupported asset: {0} has no active price")]
    UnsupportedAsset(AssetId),

    /// A pull or transfer exceeded the source account's balance.
    #[error("insufficient balance: {account} has {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account: AccountId,
        /// Its balance at the time of the call.
        available: u64,
        /// The amount requested.
        requested: u64,
    },

    /// A pull exceeded what the owner pre-authorized.
    #[error(
        "insufficient allowance: {spender} may pull {allowed} from {owner}, requested {requested}"
    )]
    InsufficientAllowance {
        /// The account whose funds were being pulled.
        owner: AccountId,
        /// The account doing the pulling.
        spender: AccountId,
        /// The remaining allowance.
        allowed: u64,
        /// The amount requested.
        requested: u64,
    },

    /// The vault cannot cover a payout even after a top-up, or a withdrawal
    /// would leave it below its required reserve.
    #[error("low reserves: required {required}, vault holds {available}")]
    LowReserves {
        /// The amount the vault needed to hold.
        required: u64,
        /// What it actually held.
        available: u64,
    },

    /// The caller lacks the role the operation requires.
    #[error("unauthorized: {account} lacks the {role} role")]
    Unauthorized {
        /// The caller.
        account: AccountId,
        /// The role that was required.
        role: Role,
    },

    /// An admin tried to revoke its own admin role.
    #[error("{0} cannot revoke its own admin role")]
    SelfLockout(AccountId),

    /// The authorization proof accompanying a redeem or consume was rejected.
    #[error("invalid authorization: {0}")]
    InvalidAuthorization(#[from] AuthorizationError),

    /// The credit ledger refused to mint because the caller is not a minter.
    #[error("credit ledger refused: {0} is not a minter")]
    NotMinter(AccountId),

    /// The credit ledger refused to move credit for a frozen account.
    #[error("credit ledger refused: account {0} is frozen")]
    AccountFrozen(AccountId),

    /// Buy, redeem, and consume require a positive quantity.
    #[error("amount must be positive")]
    ZeroAmount,

    /// A checked multiplication or addition overflowed `u64`.
    #[error("arithmetic overflow in {operation}")]
    Overflow {
        /// What was being computed.
        operation: &'static str,
    },

    /// A ledger's recorded supply cannot cover a burn.
    #[error("supply mismatch: burning {requested} from a recorded supply of {supply}")]
    SupplyMismatch {
        /// Total supply on record.
        supply: u64,
        /// The amount being burned.
        requested: u64,
    },

    /// The engine was constructed with an unusable configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<LedgerError> for SettlementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                account,
                available,
                requested,
            } => SettlementError::InsufficientBalance {
                account,
                available,
                requested,
            },
            LedgerError::InsufficientAllowance {
                owner,
                spender,
                allowed,
                requested,
            } => SettlementError::InsufficientAllowance {
                owner,
                spender,
                allowed,
                requested,
            },
            LedgerError::Overflow { .. } => SettlementError::Overflow {
                operation: "ledger credit",
            },
            LedgerError::SupplyMismatch { supply, requested } => {
                SettlementError::SupplyMismatch { supply, requested }
            }
        }
    }
}

impl From<AccessError> for SettlementError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthorized { account, role } => {
                SettlementError::Unauthorized { account, role }
            }
            AccessError::SelfLockout(account) => SettlementError::SelfLockout(account),
        }
    }
}

impl From<CreditLedgerError> for SettlementError {
    fn from(err: CreditLedgerError) -> Self {
        match err {
            CreditLedgerError::Ledger(inner) => inner.into(),
            CreditLedgerError::NotMinter(account) => SettlementError::NotMinter(account),
            CreditLedgerError::AccountFrozen(account) => SettlementError::AccountFrozen(account),
        }
    }
}
