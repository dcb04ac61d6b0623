//! # Fungible Token Ledger
//!
//! A single-asset ledger with balances, allowances, and a tracked total
//! supply. It is the model for both external collaborators the engine
//! talks to: each payment asset gets one, and the in-memory credit ledger
//! wraps one.
//!
//! Every operation validates first and mutates second. A call that returns
//! `Err` leaves the ledger exactly as it found it. The `check_*` variants
//! run the validation alone, so a caller composing several ledgers can
//! confirm every step before taking the first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::asset::AccountId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Attempted to move more than the account holds.
    #[error("insufficient balance: {account} has {available}, requested {requested}")]
    InsufficientBalance {
        /// The account being debited.
        account: AccountId,
        /// Its current balance.
        available: u64,
        /// The amount requested.
        requested: u64,
    },

    /// A pull exceeded what the owner pre-authorized for the spender.
    #[error(
        "insufficient allowance: {spender} may pull {allowed} from {owner}, requested {requested}"
    )]
    InsufficientAllowance {
        /// The account whose funds are being pulled.
        owner: AccountId,
        /// The account doing the pulling.
        spender: AccountId,
        /// The remaining allowance.
        allowed: u64,
        /// The amount requested.
        requested: u64,
    },

    /// Crediting would push a balance or the total supply past `u64::MAX`.
    #[error("ledger overflow: crediting {amount} to {account}")]
    Overflow {
        /// The account being credited.
        account: AccountId,
        /// The amount that caused the overflow.
        amount: u64,
    },

    /// Recorded supply is below the amount being destroyed.
    #[error("supply mismatch: burning {requested} from a recorded supply of {supply}")]
    SupplyMismatch {
        /// Total supply on record.
        supply: u64,
        /// The amount being burned.
        requested: u64,
    },
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// Balances, allowances, and total supply for one fungible asset.
///
/// Allowances are stored `owner -> spender -> amount`. A successful
/// [`transfer_from`](Self::transfer_from) consumes allowance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    balances: HashMap<AccountId, u64>,
    allowances: HashMap<AccountId, HashMap<AccountId, u64>>,
    total_supply: u64,
}

impl TokenLedger {
    /// Creates an empty ledger with zero supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues `amount` new units to `to`. Returns the recipient's new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if either the balance or the total
    /// supply would exceed `u64::MAX`.
    pub fn mint(&mut self, to: &AccountId, amount: u64) -> Result<u64, LedgerError> {
        let (new_supply, new_balance) = self.minted(to, amount)?;
        self.total_supply = new_supply;
        self.balances.insert(to.clone(), new_balance);
        Ok(new_balance)
    }

    /// Checks that [`mint`](Self::mint) would succeed, without minting.
    pub fn check_mint(&self, to: &AccountId, amount: u64) -> Result<(), LedgerError> {
        self.minted(to, amount).map(|_| ())
    }

    /// Destroys `amount` units held by `from`. Returns the remaining balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds less
    /// than `amount`, or [`LedgerError::SupplyMismatch`] if the recorded
    /// supply is smaller than the burn (a ledger restored from inconsistent
    /// data).
    pub fn burn(&mut self, from: &AccountId, amount: u64) -> Result<u64, LedgerError> {
        let remaining = self.checked_debit(from, amount)?;
        let new_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(LedgerError::SupplyMismatch {
                supply: self.total_supply,
                requested: amount,
            })?;
        self.balances.insert(from.clone(), remaining);
        self.total_supply = new_supply;
        Ok(remaining)
    }

    /// Moves `amount` from `from` to `to` on `from`'s own authority.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let remaining = self.checked_debit(from, amount)?;
        if from == to {
            return Ok(());
        }
        let credited = self.checked_credit(to, amount)?;

        self.balances.insert(from.clone(), remaining);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    /// Sets the amount `spender` may pull from `owner`, replacing any
    /// previous allowance.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u64) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

    /// Remaining amount `spender` may pull from `owner`.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Pulls `amount` from `from` to `to`, spending `spender`'s allowance.
    ///
    /// The allowance is checked before the balance, matching the order in
    /// which a holder would have to fix things.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientAllowance`], then
    /// [`LedgerError::InsufficientBalance`], then [`LedgerError::Overflow`].
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let allowed = self.checked_allowance(spender, from, amount)?;
        self.transfer(from, to, amount)?;
        self.approve(from, spender, allowed - amount);
        Ok(())
    }

    /// Checks that [`transfer_from`](Self::transfer_from) would succeed,
    /// reporting the same error it would.
    pub fn check_transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        self.checked_allowance(spender, from, amount)?;
        self.checked_debit(from, amount)?;
        if from != to {
            self.checked_credit(to, amount)?;
        }
        Ok(())
    }

    /// Balance held by `account`, zero if it has never been credited.
    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total units in existence.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| **b > 0).count()
    }

    fn minted(&self, to: &AccountId, amount: u64) -> Result<(u64, u64), LedgerError> {
        let overflow = || LedgerError::Overflow {
            account: to.clone(),
            amount,
        };
        let new_supply = self.total_supply.checked_add(amount).ok_or_else(overflow)?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(overflow)?;
        Ok((new_supply, new_balance))
    }

    fn checked_allowance(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: owner.clone(),
                spender: spender.clone(),
                allowed,
                requested: amount,
            });
        }
        Ok(allowed)
    }

    fn checked_debit(&self, account: &AccountId, amount: u64) -> Result<u64, LedgerError> {
        let available = self.balance_of(account);
        available
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientBalance {
                account: account.clone(),
                available,
                requested: amount,
            })
    }

    fn checked_credit(&self, account: &AccountId, amount: u64) -> Result<u64, LedgerError> {
        self.balance_of(account)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: account.clone(),
                amount,
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
