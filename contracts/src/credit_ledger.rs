//! # Credit Ledger
//!
//! The desk issues credit and the vault takes it back, but neither owns the
//! credit book. They talk to it through the [`CreditLedger`] trait so a host
//! can plug in whatever token implementation it runs.
//!
//! [`InMemoryCreditLedger`] is the bundled implementation: a single
//! [`TokenLedger`] plus two policy sets.
//!
//! - **Mint gating**: only accounts in the minter set may mint. The engine
//!   registers the desk as the minter at startup.
//! - **Freezing**: a frozen account cannot receive new credit, move credit,
//!   or consume it. Freezing does not change balances, so frozen holdings
//!   still count toward outstanding supply.

use std::collections::BTreeSet;

use reserve_protocol::ledger::{AccountId, LedgerError, TokenLedger};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a credit ledger refuses an operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CreditLedgerError {
    /// Balance or allowance shortfall, or overflow.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The caller may not mint credit.
    #[error("{0} is not a minter")]
    NotMinter(AccountId),

    /// The account is frozen.
    #[error("account {0} is frozen")]
    AccountFrozen(AccountId),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What the engine needs from a credit token.
///
/// Implementations must be all-or-nothing per call: a method that returns an
/// error leaves balances, allowances, and supply untouched.
///
/// The `can_*` checks answer whether the matching call would succeed right
/// now, with the same error it would return. The desk and vault run them
/// before moving payment funds, so a refusal from this ledger never strands
/// a payment that has already moved.
pub trait CreditLedger {
    /// Checks that [`mint`](Self::mint) would succeed.
    fn can_mint(
        &self,
        minter: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError>;

    /// Checks that [`transfer_from`](Self::transfer_from) would succeed.
    fn can_transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError>;

    /// Creates `amount` credit for `to`. `minter` must be authorised.
    fn mint(
        &mut self,
        minter: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError>;

    /// Sets how much `spender` may pull from `owner`.
    fn approve(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError>;

    /// Moves credit directly between holders.
    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError>;

    /// Pulls `amount` from `from` to `to` against `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError>;

    /// Retires `amount` of `holder`'s credit, reducing total supply.
    fn consume(&mut self, holder: &AccountId, amount: u64) -> Result<(), CreditLedgerError>;

    /// Credit held by `account`.
    fn balance_of(&self, account: &AccountId) -> u64;

    /// Remaining pull allowance from `owner` to `spender`.
    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u64;

    /// All credit in existence.
    fn total_supply(&self) -> u64;
}

/// Credit held outside the listed accounts.
///
/// The engine passes the desk and the vault here; what remains is the supply
/// the vault may have to redeem.
pub fn outstanding_supply(ledger: &dyn CreditLedger, excluded: &[&AccountId]) -> u64 {
    let mut seen: Vec<&AccountId> = Vec::with_capacity(excluded.len());
    let held = excluded.iter().fold(0u64, |acc, account| {
        if seen.contains(account) {
            return acc;
        }
        seen.push(account);
        acc.saturating_add(ledger.balance_of(account))
    });
    ledger.total_supply().saturating_sub(held)
}

// ---------------------------------------------------------------------------
// InMemoryCreditLedger
// ---------------------------------------------------------------------------

/// Credit book backed by a [`TokenLedger`], with minter and freeze policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryCreditLedger {
    ledger: TokenLedger,
    minters: BTreeSet<AccountId>,
    frozen: BTreeSet<AccountId>,
}

impl InMemoryCreditLedger {
    /// Creates an empty ledger with `minter` as its only minter.
    pub fn new(minter: AccountId) -> Self {
        let mut ledger = Self::default();
        ledger.minters.insert(minter);
        ledger
    }

    /// Adds an account to the minter set.
    pub fn add_minter(&mut self, account: AccountId) -> bool {
        self.minters.insert(account)
    }

    /// Removes an account from the minter set.
    pub fn remove_minter(&mut self, account: &AccountId) -> bool {
        self.minters.remove(account)
    }

    pub fn is_minter(&self, account: &AccountId) -> bool {
        self.minters.contains(account)
    }

    /// Freezes `account`. Returns `false` if it already was.
    pub fn freeze(&mut self, account: AccountId) -> bool {
        let changed = self.frozen.insert(account.clone());
        if changed {
            info!(%account, "credit account frozen");
        }
        changed
    }

    /// Unfreezes `account`. Returns `false` if it was not frozen.
    pub fn unfreeze(&mut self, account: &AccountId) -> bool {
        let changed = self.frozen.remove(account);
        if changed {
            info!(%account, "credit account unfrozen");
        }
        changed
    }

    pub fn is_frozen(&self, account: &AccountId) -> bool {
        self.frozen.contains(account)
    }

    /// Number of accounts holding a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.ledger.holder_count()
    }

    fn ensure_active(&self, accounts: &[&AccountId]) -> Result<(), CreditLedgerError> {
        match accounts.iter().find(|a| self.frozen.contains(**a)) {
            Some(account) => Err(CreditLedgerError::AccountFrozen((*account).clone())),
            None => Ok(()),
        }
    }
}

impl CreditLedger for InMemoryCreditLedger {
    fn can_mint(
        &self,
        minter: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError> {
        if !self.minters.contains(minter) {
            return Err(CreditLedgerError::NotMinter(minter.clone()));
        }
        self.ensure_active(&[to])?;
        Ok(self.ledger.check_mint(to, amount)?)
    }

    fn can_transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError> {
        self.ensure_active(&[from, to])?;
        Ok(self.ledger.check_transfer_from(spender, from, to, amount)?)
    }

    fn mint(
        &mut self,
        minter: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError> {
        self.can_mint(minter, to, amount)?;
        let supply = self.ledger.mint(to, amount)?;
        debug!(%minter, %to, amount, supply, "credit minted");
        Ok(())
    }

    fn approve(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError> {
        self.ledger.approve(owner, spender, amount);
        Ok(())
    }

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError> {
        self.ensure_active(&[from, to])?;
        Ok(self.ledger.transfer(from, to, amount)?)
    }

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), CreditLedgerError> {
        self.ensure_active(&[from, to])?;
        Ok(self.ledger.transfer_from(spender, from, to, amount)?)
    }

    fn consume(&mut self, holder: &AccountId, amount: u64) -> Result<(), CreditLedgerError> {
        self.ensure_active(&[holder])?;
        let supply = self.ledger.burn(holder, amount)?;
        debug!(%holder, amount, supply, "credit consumed");
        Ok(())
    }

    fn balance_of(&self, account: &AccountId) -> u64 {
        self.ledger.balance_of(account)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u64 {
        self.ledger.allowance(owner, spender)
    }

    fn total_supply(&self) -> u64 {
        self.ledger.total_supply()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(label: &str) -> AccountId {
        AccountId::from(label)
    }

    fn ledger() -> InMemoryCreditLedger {
        InMemoryCreditLedger::new(acct("desk"))
    }

    #[test]
    fn minter_can_mint() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        assert_eq!(credits.balance_of(&acct("alice")), 10);
        assert_eq!(credits.total_supply(), 10);
    }

    #[test]
    fn non_minter_rejected() {
        let mut credits = ledger();
        let err = credits.mint(&acct("alice"), &acct("alice"), 10).unwrap_err();
        assert_eq!(err, CreditLedgerError::NotMinter(acct("alice")));
        assert_eq!(credits.total_supply(), 0);
    }

    #[test]
    fn frozen_account_cannot_receive_or_move() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        credits.freeze(acct("alice"));

        assert!(matches!(
            credits.mint(&acct("desk"), &acct("alice"), 1),
            Err(CreditLedgerError::AccountFrozen(_))
        ));
        assert!(credits.transfer(&acct("alice"), &acct("bob"), 1).is_err());
        assert!(credits.consume(&acct("alice"), 1).is_err());
        assert_eq!(credits.balance_of(&acct("alice")), 10);

        credits.unfreeze(&acct("alice"));
        credits.transfer(&acct("alice"), &acct("bob"), 1).unwrap();
        assert_eq!(credits.balance_of(&acct("bob")), 1);
    }

    #[test]
    fn frozen_recipient_blocks_pull() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        credits.approve(&acct("alice"), &acct("vault"), 10).unwrap();
        credits.freeze(acct("vault"));

        let err = credits
            .transfer_from(&acct("vault"), &acct("alice"), &acct("vault"), 5)
            .unwrap_err();
        assert_eq!(err, CreditLedgerError::AccountFrozen(acct("vault")));
        assert_eq!(credits.allowance(&acct("alice"), &acct("vault")), 10);
    }

    #[test]
    fn pull_consumes_allowance() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        credits.approve(&acct("alice"), &acct("vault"), 4).unwrap();

        credits
            .transfer_from(&acct("vault"), &acct("alice"), &acct("vault"), 3)
            .unwrap();
        assert_eq!(credits.allowance(&acct("alice"), &acct("vault")), 1);

        let err = credits
            .transfer_from(&acct("vault"), &acct("alice"), &acct("vault"), 2)
            .unwrap_err();
        assert!(matches!(
            err,
            CreditLedgerError::Ledger(LedgerError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn checks_agree_with_the_calls_they_guard() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        credits.approve(&acct("alice"), &acct("vault"), 4).unwrap();

        assert_eq!(credits.can_mint(&acct("desk"), &acct("bob"), 1), Ok(()));
        assert_eq!(
            credits.can_mint(&acct("bob"), &acct("bob"), 1),
            Err(CreditLedgerError::NotMinter(acct("bob")))
        );
        assert!(credits.can_mint(&acct("desk"), &acct("bob"), u64::MAX).is_err());

        let vault = acct("vault");
        assert_eq!(credits.can_transfer_from(&vault, &acct("alice"), &vault, 4), Ok(()));
        assert!(matches!(
            credits.can_transfer_from(&vault, &acct("alice"), &vault, 5),
            Err(CreditLedgerError::Ledger(LedgerError::InsufficientAllowance { .. }))
        ));

        credits.freeze(acct("alice"));
        assert_eq!(
            credits.can_transfer_from(&vault, &acct("alice"), &vault, 1),
            Err(CreditLedgerError::AccountFrozen(acct("alice")))
        );
        assert_eq!(credits.allowance(&acct("alice"), &vault), 4);
    }

    #[test]
    fn consume_reduces_supply() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        credits.consume(&acct("alice"), 4).unwrap();
        assert_eq!(credits.total_supply(), 6);
        assert!(credits.consume(&acct("alice"), 7).is_err());
        assert_eq!(credits.total_supply(), 6);
    }

    #[test]
    fn outstanding_supply_excludes_listed_accounts() {
        let mut credits = ledger();
        credits.mint(&acct("desk"), &acct("alice"), 10).unwrap();
        credits.mint(&acct("desk"), &acct("vault"), 3).unwrap();
        credits.mint(&acct("desk"), &acct("desk"), 2).unwrap();

        assert_eq!(outstanding_supply(&credits, &[]), 15);
        assert_eq!(outstanding_supply(&credits, &[&acct("desk"), &acct("vault")]), 10);
        // listing an account twice does not double-subtract
        assert_eq!(outstanding_supply(&credits, &[&acct("vault"), &acct("vault")]), 12);
    }
}
