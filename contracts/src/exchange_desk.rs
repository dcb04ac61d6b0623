//! # Exchange Desk
//!
//! Sells credit for payment assets at administered prices and holds the
//! proceeds as its treasury.
//!
//! ## Buy flow
//!
//! 1. Price the order: `cost = quantity * price`, checked.
//! 2. Pull `cost` of the payment asset from the buyer. The buyer must have
//!    approved the desk beforehand.
//! 3. Ask the credit ledger to mint `quantity` to the buyer, with the desk
//!    as minter.
//!
//! If step 3 fails after step 2 succeeded, the caller's transaction scope is
//! responsible for undoing the pull. [`SettlementEngine`](crate::SettlementEngine)
//! runs every call in one.
//!
//! ## Treasury
//!
//! The treasury is simply the desk account's balance on the payment ledger.
//! Anything that lands there, purchases or direct transfers, is treasury.
//! Accounts holding the desk's `Withdrawer` role may pull it; at setup that
//! is the reserve vault.

use chrono::{DateTime, Utc};
use reserve_protocol::access::{AccessControl, Role};
use reserve_protocol::ledger::{AccountId, AssetId, PaymentBook};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::credit_ledger::CreditLedger;
use crate::error::{SettlementError, SettlementResult};
use crate::events::{Component, EventLog, SettlementEvent};
use crate::price_table::{PriceEntry, PriceSource, PriceTable};

/// How much of the treasury to withdraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasuryAmount {
    /// Up to this much; less if the treasury holds less.
    Exact(u64),
    /// Whatever the treasury holds.
    All,
}

/// Receipt for a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub buyer: AccountId,
    pub asset: AssetId,
    pub quantity: u64,
    pub price: u64,
    pub cost: u64,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeDesk {
    account: AccountId,
    prices: PriceTable,
    access: AccessControl,
}

impl ExchangeDesk {
    /// Creates a desk trading as `account`, administered by `admin`.
    pub fn new(account: AccountId, admin: AccountId) -> Self {
        Self {
            account,
            prices: PriceTable::new(),
            access: AccessControl::new(admin),
        }
    }

    /// The desk's own account on both ledgers.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Grants a desk role. Admin only.
    pub fn grant_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
        events: &mut EventLog,
    ) -> SettlementResult<bool> {
        let added = self.access.grant(caller, role, account.clone())?;
        if added {
            events.emit(SettlementEvent::RoleGranted {
                component: Component::Desk,
                role,
                account,
            });
        }
        Ok(added)
    }

    /// Revokes a desk role. Admin only.
    pub fn revoke_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
        events: &mut EventLog,
    ) -> SettlementResult<bool> {
        let removed = self.access.revoke(caller, role, account)?;
        if removed {
            events.emit(SettlementEvent::RoleRevoked {
                component: Component::Desk,
                role,
                account: account.clone(),
            });
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Pricing
    // -----------------------------------------------------------------------

    /// Sets the price of one credit in `asset`. Zero disables the asset.
    ///
    /// Requires `PriceSetter`.
    pub fn set_price(
        &mut self,
        caller: &AccountId,
        asset: AssetId,
        price: u64,
        events: &mut EventLog,
    ) -> SettlementResult<PriceEntry> {
        self.access.require(Role::PriceSetter, caller)?;
        let previous = self.prices.set(asset, price, caller.clone());
        info!(%caller, %asset, price, ?previous, "price updated");
        events.emit(SettlementEvent::PriceUpdated {
            asset,
            price,
            previous,
            by: caller.clone(),
        });
        self.prices
            .entry(&asset)
            .cloned()
            .ok_or(SettlementError::UnsupportedAsset(asset))
    }

    /// Cost of `quantity` credit paid in `asset`.
    pub fn quote_cost(&self, asset: &AssetId, quantity: u64) -> SettlementResult<u64> {
        self.prices.quote(asset, quantity)
    }

    // -----------------------------------------------------------------------
    // Trading
    // -----------------------------------------------------------------------

    /// Sells `quantity` credit to `buyer` for `asset`.
    ///
    /// The mint is checked before the payment is pulled, so a call that
    /// fails moves nothing.
    pub fn buy(
        &mut self,
        buyer: &AccountId,
        asset: &AssetId,
        quantity: u64,
        payments: &mut PaymentBook,
        credits: &mut dyn CreditLedger,
        events: &mut EventLog,
    ) -> SettlementResult<Purchase> {
        if quantity == 0 {
            return Err(SettlementError::ZeroAmount);
        }
        let price = self.prices.require_price(asset)?;
        let cost = crate::price_table::scale(quantity, price, "purchase cost")?;

        credits.can_mint(&self.account, buyer, quantity)?;
        payments.transfer_from(asset, &self.account, buyer, &self.account, cost)?;
        credits.mint(&self.account, buyer, quantity)?;

        info!(%buyer, %asset, quantity, cost, "credit purchased");
        events.emit(SettlementEvent::Purchased {
            buyer: buyer.clone(),
            asset: *asset,
            quantity,
            cost,
        });

        Ok(Purchase {
            id: Uuid::new_v4(),
            buyer: buyer.clone(),
            asset: *asset,
            quantity,
            price,
            cost,
            executed_at: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Treasury
    // -----------------------------------------------------------------------

    /// Payment-asset balance held by the desk.
    pub fn treasury_balance(&self, asset: &AssetId, payments: &PaymentBook) -> u64 {
        payments.balance_of(asset, &self.account)
    }

    /// Moves treasury funds to `caller`. Requires `Withdrawer`.
    ///
    /// Never fails for lack of funds: the amount moved is capped at the
    /// treasury balance and returned.
    pub fn withdraw_treasury(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        amount: TreasuryAmount,
        payments: &mut PaymentBook,
        events: &mut EventLog,
    ) -> SettlementResult<u64> {
        self.access.require(Role::Withdrawer, caller)?;

        let balance = self.treasury_balance(asset, payments);
        let moved = match amount {
            TreasuryAmount::All => balance,
            TreasuryAmount::Exact(requested) => requested.min(balance),
        };
        if moved == 0 {
            return Ok(0);
        }

        payments.transfer(asset, &self.account, caller, moved)?;
        info!(%caller, %asset, amount = moved, "treasury withdrawn");
        events.emit(SettlementEvent::TreasuryWithdrawn {
            asset: *asset,
            to: caller.clone(),
            amount: moved,
        });
        Ok(moved)
    }
}

impl PriceSource for ExchangeDesk {
    fn price_of(&self, asset: &AssetId) -> Option<u64> {
        self.prices.price_of(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit_ledger::InMemoryCreditLedger;

    fn acct(label: &str) -> AccountId {
        AccountId::from(label)
    }

    fn usdc() -> AssetId {
        AssetId::derive("USDC", "devnet")
    }

    struct Fixture {
        desk: ExchangeDesk,
        payments: PaymentBook,
        credits: InMemoryCreditLedger,
        events: EventLog,
    }

    fn fixture() -> Fixture {
        let mut desk = ExchangeDesk::new(acct("desk"), acct("owner"));
        let mut events = EventLog::new();
        desk.grant_role(&acct("owner"), Role::PriceSetter, acct("owner"), &mut events)
            .unwrap();
        desk.set_price(&acct("owner"), usdc(), 100, &mut events).unwrap();

        let mut payments = PaymentBook::new();
        payments.mint(&usdc(), &acct("alice"), 10_000).unwrap();
        payments.approve(&usdc(), &acct("alice"), &acct("desk"), 10_000);

        Fixture {
            desk,
            payments,
            credits: InMemoryCreditLedger::new(acct("desk")),
            events,
        }
    }

    #[test]
    fn buy_pulls_payment_and_mints() {
        let mut f = fixture();
        let receipt = f
            .desk
            .buy(&acct("alice"), &usdc(), 7, &mut f.payments, &mut f.credits, &mut f.events)
            .unwrap();

        assert_eq!(receipt.cost, 700);
        assert_eq!(receipt.price, 100);
        assert_eq!(f.credits.balance_of(&acct("alice")), 7);
        assert_eq!(f.desk.treasury_balance(&usdc(), &f.payments), 700);
        assert_eq!(f.payments.balance_of(&usdc(), &acct("alice")), 9_300);
    }

    #[test]
    fn buy_zero_rejected() {
        let mut f = fixture();
        let err = f
            .desk
            .buy(&acct("alice"), &usdc(), 0, &mut f.payments, &mut f.credits, &mut f.events)
            .unwrap_err();
        assert_eq!(err, SettlementError::ZeroAmount);
    }

    #[test]
    fn buy_unpriced_asset_rejected() {
        let mut f = fixture();
        let other = AssetId::derive("EURC", "devnet");
        let err = f
            .desk
            .buy(&acct("alice"), &other, 1, &mut f.payments, &mut f.credits, &mut f.events)
            .unwrap_err();
        assert_eq!(err, SettlementError::UnsupportedAsset(other));
    }

    #[test]
    fn buy_without_approval_moves_nothing() {
        let mut f = fixture();
        f.payments.mint(&usdc(), &acct("bob"), 1_000).unwrap();
        let err = f
            .desk
            .buy(&acct("bob"), &usdc(), 1, &mut f.payments, &mut f.credits, &mut f.events)
            .unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientAllowance { .. }));
        assert_eq!(f.payments.balance_of(&usdc(), &acct("bob")), 1_000);
        assert_eq!(f.credits.total_supply(), 0);
    }

    #[test]
    fn refused_mint_keeps_the_payment() {
        let mut f = fixture();
        f.credits.freeze(acct("alice"));
        let before = f.events.len();

        let err = f
            .desk
            .buy(&acct("alice"), &usdc(), 3, &mut f.payments, &mut f.credits, &mut f.events)
            .unwrap_err();

        assert_eq!(err, SettlementError::AccountFrozen(acct("alice")));
        assert_eq!(f.payments.balance_of(&usdc(), &acct("alice")), 10_000);
        assert_eq!(f.payments.allowance(&usdc(), &acct("alice"), &acct("desk")), 10_000);
        assert_eq!(f.desk.treasury_balance(&usdc(), &f.payments), 0);
        assert_eq!(f.events.len(), before);
    }

    #[test]
    fn set_price_requires_role() {
        let mut f = fixture();
        let err = f
            .desk
            .set_price(&acct("alice"), usdc(), 1, &mut f.events)
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Unauthorized {
                role: Role::PriceSetter,
                ..
            }
        ));
        assert_eq!(f.desk.price_of(&usdc()), Some(100));
    }

    #[test]
    fn quote_tracks_price_changes() {
        let mut f = fixture();
        assert_eq!(f.desk.quote_cost(&usdc(), 3), Ok(300));
        f.desk.set_price(&acct("owner"), usdc(), 0, &mut f.events).unwrap();
        assert!(f.desk.quote_cost(&usdc(), 3).is_err());
    }

    #[test]
    fn withdraw_treasury_is_capped_at_balance() {
        let mut f = fixture();
        f.desk
            .grant_role(&acct("owner"), Role::Withdrawer, acct("vault"), &mut f.events)
            .unwrap();
        f.desk
            .buy(&acct("alice"), &usdc(), 5, &mut f.payments, &mut f.credits, &mut f.events)
            .unwrap();

        let moved = f
            .desk
            .withdraw_treasury(&acct("vault"), &usdc(), TreasuryAmount::Exact(200), &mut f.payments, &mut f.events)
            .unwrap();
        assert_eq!(moved, 200);

        let moved = f
            .desk
            .withdraw_treasury(&acct("vault"), &usdc(), TreasuryAmount::Exact(10_000), &mut f.payments, &mut f.events)
            .unwrap();
        assert_eq!(moved, 300);
        assert_eq!(f.payments.balance_of(&usdc(), &acct("vault")), 500);

        let moved = f
            .desk
            .withdraw_treasury(&acct("vault"), &usdc(), TreasuryAmount::All, &mut f.payments, &mut f.events)
            .unwrap();
        assert_eq!(moved, 0);
    }

    #[test]
    fn withdraw_treasury_requires_capability() {
        let mut f = fixture();
        let err = f
            .desk
            .withdraw_treasury(&acct("alice"), &usdc(), TreasuryAmount::All, &mut f.payments, &mut f.events)
            .unwrap_err();
        assert!(matches!(err, SettlementError::Unauthorized { .. }));
    }

    #[test]
    fn role_changes_are_recorded() {
        let mut f = fixture();
        let before = f.events.len();
        f.desk
            .grant_role(&acct("owner"), Role::Withdrawer, acct("vault"), &mut f.events)
            .unwrap();
        f.desk
            .revoke_role(&acct("owner"), Role::Withdrawer, &acct("vault"), &mut f.events)
            .unwrap();
        assert_eq!(f.events.len(), before + 2);
        assert_eq!(f.events.last().map(|e| e.kind()), Some("role_revoked"));
    }
}
