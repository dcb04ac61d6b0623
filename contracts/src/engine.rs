//! # Settlement Engine
//!
//! Owns the desk, the vault, both ledgers, the voucher verifier, and the
//! event log, and runs every state-changing call as one transaction.
//!
//! ## Transactions
//!
//! The desk and vault check every leg of a call before moving anything,
//! and each ledger call is all-or-nothing on its own. The engine adds a
//! checkpoint around each call for what the components cannot undo
//! themselves, chiefly a plugged-in credit ledger whose checks disagree
//! with its calls. The caller sees either every effect of the operation or
//! none.
//!
//! The checkpoint copies what is bounded by the number of accounts: the
//! role tables, the price table, and both ledgers. The event log and the
//! verifier's spent nonces grow with history, so they are not copied; the
//! checkpoint records their length and a failed call truncates back to it.
//!
//! ## Concurrency
//!
//! [`SettlementEngine`] takes `&mut self` for every mutation, so the borrow
//! checker serializes calls within a thread. [`SharedEngine`] puts one
//! behind a mutex for hosts that call from several threads.

use std::sync::Arc;

use parking_lot::Mutex;
use reserve_protocol::access::Role;
use reserve_protocol::config::EngineConfig;
use reserve_protocol::crypto::SignerPublicKey;
use reserve_protocol::ledger::{AccountId, AssetId, PaymentBook};
use tracing::{debug, info, warn};

use crate::authorization::{
    AuthorizationProof, AuthorizationVerifier, AuthorizedAction, Ed25519VoucherVerifier,
};
use crate::credit_ledger::{CreditLedger, InMemoryCreditLedger};
use crate::error::{SettlementError, SettlementResult};
use crate::events::{EventLog, SettlementEvent};
use crate::exchange_desk::{ExchangeDesk, Purchase, TreasuryAmount};
use crate::price_table::PriceEntry;
use crate::reserve_vault::{Redemption, ReserveReport, ReserveVault};

/// Engine wired to the bundled credit ledger and voucher verifier.
pub type DefaultEngine = SettlementEngine<InMemoryCreditLedger, Ed25519VoucherVerifier>;

#[derive(Debug)]
struct EngineState<C, V> {
    desk: ExchangeDesk,
    vault: ReserveVault,
    payments: PaymentBook,
    credits: C,
    verifier: V,
    events: EventLog,
}

/// What a failed call is rolled back to.
struct Checkpoint<C> {
    desk: ExchangeDesk,
    vault: ReserveVault,
    payments: PaymentBook,
    credits: C,
    events: usize,
    vouchers: usize,
}

impl<C: Clone> Checkpoint<C> {
    fn take<V: AuthorizationVerifier>(state: &EngineState<C, V>) -> Self {
        Self {
            desk: state.desk.clone(),
            vault: state.vault.clone(),
            payments: state.payments.clone(),
            credits: state.credits.clone(),
            events: state.events.len(),
            vouchers: state.verifier.checkpoint(),
        }
    }

    fn restore<V: AuthorizationVerifier>(self, state: &mut EngineState<C, V>) {
        state.desk = self.desk;
        state.vault = self.vault;
        state.payments = self.payments;
        state.credits = self.credits;
        state.events.truncate(self.events);
        state.verifier.rollback(self.vouchers);
    }
}

/// The desk and vault plus everything they settle against.
#[derive(Debug)]
pub struct SettlementEngine<C, V> {
    config: EngineConfig,
    state: EngineState<C, V>,
}

impl DefaultEngine {
    /// Builds an engine with an empty [`InMemoryCreditLedger`] (desk as
    /// minter) and an [`Ed25519VoucherVerifier`] trusting `voucher_signer`.
    pub fn with_defaults(
        config: EngineConfig,
        voucher_signer: SignerPublicKey,
    ) -> SettlementResult<Self> {
        let credits = InMemoryCreditLedger::new(config.desk());
        let verifier = Ed25519VoucherVerifier::new(
            voucher_signer,
            config.voucher_domain.clone(),
            config.max_voucher_ttl_secs,
        );
        Self::new(config, credits, verifier)
    }
}

impl<C, V> SettlementEngine<C, V>
where
    C: CreditLedger + Clone,
    V: AuthorizationVerifier,
{
    /// Validates `config` and sets up the desk and vault.
    ///
    /// At setup the admin holds every role on both components, and the
    /// vault holds `Withdrawer` on the desk so it can top itself up from
    /// the treasury. `credits` must already accept the desk as a minter.
    pub fn new(config: EngineConfig, credits: C, verifier: V) -> SettlementResult<Self> {
        config
            .validate()
            .map_err(|e| SettlementError::InvalidConfig(e.to_string()))?;

        let admin = config.admin();
        let asset = config.payment_asset.asset_id();
        let mut events = EventLog::new();

        let mut desk = ExchangeDesk::new(config.desk(), admin.clone());
        desk.grant_role(&admin, Role::PriceSetter, admin.clone(), &mut events)?;
        desk.grant_role(&admin, Role::Withdrawer, config.vault(), &mut events)?;

        let mut vault = ReserveVault::new(config.vault(), asset, admin.clone());
        vault.grant_role(&admin, Role::Withdrawer, admin.clone(), &mut events)?;

        info!(
            desk = %desk.account(),
            vault = %vault.account(),
            %admin,
            %asset,
            "settlement engine ready"
        );

        Ok(Self {
            config,
            state: EngineState {
                desk,
                vault,
                payments: PaymentBook::new(),
                credits,
                verifier,
                events,
            },
        })
    }

    /// Runs `op` against the live state, restoring the checkpoint on error.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&mut EngineState<C, V>) -> SettlementResult<T>,
    ) -> SettlementResult<T> {
        let checkpoint = Checkpoint::take(&self.state);
        match op(&mut self.state) {
            Ok(value) => {
                self.state.verifier.commit();
                Ok(value)
            }
            Err(err) => {
                checkpoint.restore(&mut self.state);
                warn!(operation, error = %err, "operation aborted, state restored");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn desk(&self) -> &ExchangeDesk {
        &self.state.desk
    }

    pub fn vault(&self) -> &ReserveVault {
        &self.state.vault
    }

    pub fn payments(&self) -> &PaymentBook {
        &self.state.payments
    }

    pub fn credits(&self) -> &C {
        &self.state.credits
    }

    /// Direct access to the credit ledger's own administration (freezing,
    /// minter sets). Bypasses the transaction scope.
    pub fn credits_mut(&mut self) -> &mut C {
        &mut self.state.credits
    }

    pub fn verifier(&self) -> &V {
        &self.state.verifier
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// The asset the vault reserves in.
    pub fn payment_asset(&self) -> AssetId {
        *self.state.vault.asset()
    }

    // -----------------------------------------------------------------------
    // Exchange desk
    // -----------------------------------------------------------------------

    pub fn set_price(
        &mut self,
        caller: &AccountId,
        asset: AssetId,
        price: u64,
    ) -> SettlementResult<PriceEntry> {
        self.transact("set_price", |s| {
            s.desk.set_price(caller, asset, price, &mut s.events)
        })
    }

    pub fn quote_cost(&self, asset: &AssetId, quantity: u64) -> SettlementResult<u64> {
        self.state.desk.quote_cost(asset, quantity)
    }

    /// Sells `quantity` credit to `buyer`, who must have approved the desk
    /// for the cost on the payment ledger.
    pub fn buy(
        &mut self,
        buyer: &AccountId,
        asset: &AssetId,
        quantity: u64,
    ) -> SettlementResult<Purchase> {
        self.transact("buy", |s| {
            s.desk.buy(
                buyer,
                asset,
                quantity,
                &mut s.payments,
                &mut s.credits,
                &mut s.events,
            )
        })
    }

    pub fn withdraw_treasury(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        amount: TreasuryAmount,
    ) -> SettlementResult<u64> {
        self.transact("withdraw_treasury", |s| {
            s.desk
                .withdraw_treasury(caller, asset, amount, &mut s.payments, &mut s.events)
        })
    }

    pub fn treasury_balance(&self) -> u64 {
        self.state
            .desk
            .treasury_balance(self.state.vault.asset(), &self.state.payments)
    }

    // -----------------------------------------------------------------------
    // Reserve vault
    // -----------------------------------------------------------------------

    /// Redeems `amount` credit for `holder`. The holder must have approved
    /// the vault on the credit ledger and present a voucher for the call.
    pub fn redeem(
        &mut self,
        holder: &AccountId,
        amount: u64,
        proof: &AuthorizationProof,
    ) -> SettlementResult<Redemption> {
        self.transact("redeem", |s| {
            s.vault.redeem(
                holder,
                amount,
                proof,
                &mut s.verifier,
                &mut s.desk,
                &mut s.payments,
                &mut s.credits,
                &mut s.events,
            )
        })
    }

    /// Retires `amount` of `holder`'s credit without payment.
    ///
    /// Shrinks outstanding supply, so the required reserve falls by
    /// `amount * price` while the vault balance stays put.
    pub fn consume(
        &mut self,
        holder: &AccountId,
        amount: u64,
        proof: &AuthorizationProof,
    ) -> SettlementResult<()> {
        self.transact("consume", |s| {
            if amount == 0 {
                return Err(SettlementError::ZeroAmount);
            }
            s.verifier
                .verify(AuthorizedAction::Consume, holder, amount, proof)?;
            s.credits.consume(holder, amount)?;
            info!(%holder, credits = amount, "credit consumed");
            s.events.emit(SettlementEvent::CreditsConsumed {
                holder: holder.clone(),
                credits: amount,
            });
            Ok(())
        })
    }

    pub fn withdraw(&mut self, caller: &AccountId) -> SettlementResult<u64> {
        self.transact("withdraw", |s| {
            s.vault
                .withdraw(caller, &s.desk, &mut s.payments, &s.credits, &mut s.events)
        })
    }

    pub fn withdraw_all(&mut self, caller: &AccountId) -> SettlementResult<u64> {
        self.transact("withdraw_all", |s| {
            s.vault.withdraw_all(caller, &mut s.payments, &mut s.events)
        })
    }

    pub fn required_reserve(&self) -> SettlementResult<u64> {
        let s = &self.state;
        s.vault.required_reserve(&s.desk, &s.payments, &s.credits)
    }

    pub fn available_balance(&self) -> SettlementResult<u64> {
        let s = &self.state;
        s.vault.available_balance(&s.desk, &s.payments, &s.credits)
    }

    pub fn reserve_report(&self) -> SettlementResult<ReserveReport> {
        let s = &self.state;
        s.vault.report(&s.desk, &s.payments, &s.credits)
    }

    pub fn vault_balance(&self) -> u64 {
        self.state.vault.balance(&self.state.payments)
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    pub fn grant_desk_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
    ) -> SettlementResult<bool> {
        self.transact("grant_desk_role", |s| {
            s.desk.grant_role(caller, role, account, &mut s.events)
        })
    }

    pub fn revoke_desk_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> SettlementResult<bool> {
        self.transact("revoke_desk_role", |s| {
            s.desk.revoke_role(caller, role, account, &mut s.events)
        })
    }

    pub fn grant_vault_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
    ) -> SettlementResult<bool> {
        self.transact("grant_vault_role", |s| {
            s.vault.grant_role(caller, role, account, &mut s.events)
        })
    }

    pub fn revoke_vault_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> SettlementResult<bool> {
        self.transact("revoke_vault_role", |s| {
            s.vault.revoke_role(caller, role, account, &mut s.events)
        })
    }

    // -----------------------------------------------------------------------
    // Ledger pass-throughs
    // -----------------------------------------------------------------------

    /// Issues payment-asset funds to `to`, standing in for the asset's
    /// external issuer.
    pub fn issue_payment(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> SettlementResult<u64> {
        self.transact("issue_payment", |s| {
            let supply = s.payments.mint(asset, to, amount)?;
            debug!(%asset, %to, amount, supply, "payment asset issued");
            Ok(supply)
        })
    }

    /// Moves payment-asset funds on `from`'s authority. Sending to the desk
    /// or vault account funds the treasury or the reserve directly.
    pub fn transfer_payment(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> SettlementResult<()> {
        self.transact("transfer_payment", |s| {
            s.payments.transfer(asset, from, to, amount)?;
            Ok(())
        })
    }

    pub fn approve_payment(
        &mut self,
        asset: &AssetId,
        owner: &AccountId,
        spender: &AccountId,
        amount: u64,
    ) {
        self.state.payments.approve(asset, owner, spender, amount);
    }

    pub fn payment_balance(&self, asset: &AssetId, account: &AccountId) -> u64 {
        self.state.payments.balance_of(asset, account)
    }

    pub fn approve_credit(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: u64,
    ) -> SettlementResult<()> {
        self.transact("approve_credit", |s| {
            s.credits.approve(owner, spender, amount)?;
            Ok(())
        })
    }

    pub fn transfer_credit(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> SettlementResult<()> {
        self.transact("transfer_credit", |s| {
            s.credits.transfer(from, to, amount)?;
            Ok(())
        })
    }

    pub fn credit_balance(&self, account: &AccountId) -> u64 {
        self.state.credits.balance_of(account)
    }
}

// ---------------------------------------------------------------------------
// SharedEngine
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle to one engine.
///
/// Each closure runs with the lock held, so a sequence of calls inside one
/// closure is not interleaved with other threads.
#[derive(Debug)]
pub struct SharedEngine<C, V> {
    inner: Arc<Mutex<SettlementEngine<C, V>>>,
}

impl<C, V> Clone for SharedEngine<C, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, V> SharedEngine<C, V> {
    pub fn new(engine: SettlementEngine<C, V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut SettlementEngine<C, V>) -> R) -> R {
        let mut engine = self.inner.lock();
        f(&mut engine)
    }

    /// Runs `f` with shared access to the engine.
    pub fn read<R>(&self, f: impl FnOnce(&SettlementEngine<C, V>) -> R) -> R {
        let engine = self.inner.lock();
        f(&engine)
    }
}
