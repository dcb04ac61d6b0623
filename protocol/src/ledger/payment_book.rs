//! # Payment Book
//!
//! The set of payment-asset ledgers, one [`TokenLedger`] per [`AssetId`].
//!
//! Assets are registered lazily: the first mint or approval for an asset
//! creates its ledger. Reads against an asset nobody has touched yet report
//! zero rather than failing, because "no ledger" and "empty ledger" mean the
//! same thing to a balance query.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::asset::{asset_id_map, AccountId, AssetId};
use super::token_ledger::{LedgerError, TokenLedger};

/// All payment-asset balances known to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBook {
    #[serde(with = "asset_id_map")]
    ledgers: HashMap<AssetId, TokenLedger>,
}

impl PaymentBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of one asset's ledger, if it exists.
    pub fn ledger(&self, asset: &AssetId) -> Option<&TokenLedger> {
        self.ledgers.get(asset)
    }

    fn ledger_mut(&mut self, asset: &AssetId) -> &mut TokenLedger {
        self.ledgers.entry(*asset).or_default()
    }

    /// Issues `amount` of `asset` to `to`.
    pub fn mint(&mut self, asset: &AssetId, to: &AccountId, amount: u64) -> Result<u64, LedgerError> {
        self.ledger_mut(asset).mint(to, amount)
    }

    /// Moves `amount` of `asset` on the sender's own authority.
    pub fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        match self.ledgers.get_mut(asset) {
            Some(ledger) => ledger.transfer(from, to, amount),
            // An untouched asset behaves like an empty ledger and stays unregistered.
            None => TokenLedger::new().transfer(from, to, amount),
        }
    }

    /// Sets `spender`'s allowance over `owner`'s `asset` balance.
    pub fn approve(&mut self, asset: &AssetId, owner: &AccountId, spender: &AccountId, amount: u64) {
        self.ledger_mut(asset).approve(owner, spender, amount);
    }

    /// Pulls `amount` of `asset` from `from` using `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        match self.ledgers.get_mut(asset) {
            Some(ledger) => ledger.transfer_from(spender, from, to, amount),
            None => TokenLedger::new().transfer_from(spender, from, to, amount),
        }
    }

    /// Balance of `account` in `asset`.
    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> u64 {
        self.ledgers
            .get(asset)
            .map(|l| l.balance_of(account))
            .unwrap_or(0)
    }

    /// Remaining allowance of `spender` over `owner`'s `asset`.
    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> u64 {
        self.ledgers
            .get(asset)
            .map(|l| l.allowance(owner, spender))
            .unwrap_or(0)
    }

    /// Total issued units of `asset`.
    pub fn total_supply(&self, asset: &AssetId) -> u64 {
        self.ledgers.get(asset).map(|l| l.total_supply()).unwrap_or(0)
    }

    /// Number of assets with a ledger.
    pub fn asset_count(&self) -> usize {
        self.ledgers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> AssetId {
        AssetId::derive("USDC", "circle")
    }

    fn brl() -> AssetId {
        AssetId::derive("BRL", "bcb")
    }

    #[test]
    fn unknown_asset_reads_as_zero() {
        let book = PaymentBook::new();
        assert_eq!(book.balance_of(&usdc(), &AccountId::from("alice")), 0);
        assert_eq!(book.total_supply(&usdc()), 0);
        assert!(book.ledger(&usdc()).is_none());
    }

    #[test]
    fn assets_are_isolated() {
        let mut book = PaymentBook::new();
        let alice = AccountId::from("alice");
        book.mint(&usdc(), &alice, 100).unwrap();
        book.mint(&brl(), &alice, 7).unwrap();

        assert_eq!(book.balance_of(&usdc(), &alice), 100);
        assert_eq!(book.balance_of(&brl(), &alice), 7);
        assert_eq!(book.asset_count(), 2);
    }

    #[test]
    fn transfer_from_on_unknown_asset_fails_on_allowance() {
        let mut book = PaymentBook::new();
        let err = book
            .transfer_from(
                &usdc(),
                &AccountId::from("desk"),
                &AccountId::from("alice"),
                &AccountId::from("desk"),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
        assert_eq!(book.asset_count(), 0);
    }

    #[test]
    fn book_serialization_roundtrip() {
        let mut book = PaymentBook::new();
        book.mint(&usdc(), &AccountId::from("vault"), 9).unwrap();

        let json = serde_json::to_string(&book).unwrap();
        let back: PaymentBook = serde_json::from_str(&json).unwrap();
        assert_eq!(back, book);
    }
}
