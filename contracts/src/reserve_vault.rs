//! # Reserve Vault
//!
//! Holds the payment-asset reserve that backs outstanding credit, and pays
//! holders who return credit at the desk's current price.
//!
//! ## Solvency
//!
//! ```text
//! outstanding = credit supply - credit held by desk - credit held by vault
//! required    = outstanding * price
//! available   = vault balance - required    (0 when underfunded)
//! ```
//!
//! Every input is read live from the ledgers and the desk. The vault keeps
//! no cached figure that could drift.
//!
//! ## Redemption
//!
//! 1. The payout is `amount * price`.
//! 2. If the vault holds less than the payout, the vault plus the whole
//!    desk treasury must cover it, else [`SettlementError::LowReserves`].
//! 3. A needed top-up requires the vault's `Withdrawer` grant on the desk.
//! 4. The holder must have approved the vault for the credit on the credit
//!    ledger.
//! 5. The voucher is verified, which spends its nonce.
//! 6. Top up from the treasury, pull the credit, pay the holder.
//!
//! Nothing moves until steps 1-5 have passed, so a failed redemption
//! leaves the ledgers, the voucher, and the event log as they were.

use chrono::{DateTime, Utc};
use reserve_protocol::access::{AccessControl, Role};
use reserve_protocol::ledger::{AccountId, AssetId, PaymentBook};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authorization::{AuthorizationProof, AuthorizationVerifier, AuthorizedAction};
use crate::credit_ledger::{outstanding_supply, CreditLedger};
use crate::error::{SettlementError, SettlementResult};
use crate::events::{Component, EventLog, SettlementEvent};
use crate::exchange_desk::{ExchangeDesk, TreasuryAmount};
use crate::price_table::{scale, PriceSource};

// ---------------------------------------------------------------------------
// Solvency math
// ---------------------------------------------------------------------------

/// The three live figures every solvency answer is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveInputs {
    /// Payment asset held by the vault.
    pub vault_balance: u64,
    /// Credit held outside the desk and the vault.
    pub outstanding_supply: u64,
    /// Desk price of one credit in the payment asset.
    pub price: u64,
}

impl ReserveInputs {
    /// `outstanding_supply * price`.
    pub fn required_reserve(&self) -> SettlementResult<u64> {
        scale(self.outstanding_supply, self.price, "required reserve")
    }

    /// Balance above the required reserve, or 0 when underfunded.
    pub fn available_balance(&self) -> SettlementResult<u64> {
        Ok(self.vault_balance.saturating_sub(self.required_reserve()?))
    }

    /// What a surplus withdrawal would move.
    ///
    /// Fails with [`SettlementError::LowReserves`] when the vault is below
    /// its requirement. Exactly funded yields `Ok(0)`.
    pub fn withdrawable_surplus(&self) -> SettlementResult<u64> {
        let required = self.required_reserve()?;
        if self.vault_balance < required {
            return Err(SettlementError::LowReserves {
                required,
                available: self.vault_balance,
            });
        }
        Ok(self.vault_balance - required)
    }
}

/// A point-in-time solvency summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveReport {
    pub asset: AssetId,
    pub vault_balance: u64,
    pub treasury_balance: u64,
    pub outstanding_supply: u64,
    pub price: u64,
    pub required_reserve: u64,
    pub available_balance: u64,
    /// `vault_balance >= required_reserve`.
    pub solvent: bool,
    pub generated_at: DateTime<Utc>,
}

/// Receipt for a completed redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: Uuid,
    pub holder: AccountId,
    pub credits: u64,
    pub price: u64,
    pub payout: u64,
    /// Treasury pulled into the vault to fund this redemption.
    pub topped_up: u64,
    pub executed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ReserveVault
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveVault {
    account: AccountId,
    asset: AssetId,
    access: AccessControl,
}

impl ReserveVault {
    /// Creates a vault reserving in `asset`, administered by `admin`.
    pub fn new(account: AccountId, asset: AssetId, admin: AccountId) -> Self {
        Self {
            account,
            asset,
            access: AccessControl::new(admin),
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// The payment asset this vault holds and pays out.
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Grants a vault role. Admin only.
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
                component: Component::Vault,
                role,
                account,
            });
        }
        Ok(added)
    }

    /// Revokes a vault role. Admin only.
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
                component: Component::Vault,
                role,
                account: account.clone(),
            });
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn balance(&self, payments: &PaymentBook) -> u64 {
        payments.balance_of(&self.asset, &self.account)
    }

    /// Reads the live solvency inputs.
    ///
    /// Fails with [`SettlementError::UnsupportedAsset`] if the desk has no
    /// active price for the reserve asset.
    pub fn inputs(
        &self,
        desk: &ExchangeDesk,
        payments: &PaymentBook,
        credits: &dyn CreditLedger,
    ) -> SettlementResult<ReserveInputs> {
        let price = desk
            .price_of(&self.asset)
            .ok_or(SettlementError::UnsupportedAsset(self.asset))?;
        let inputs = ReserveInputs {
            vault_balance: self.balance(payments),
            outstanding_supply: outstanding_supply(credits, &[desk.account(), &self.account]),
            price,
        };
        debug!(
            vault_balance = inputs.vault_balance,
            outstanding_supply = inputs.outstanding_supply,
            price,
            "reserve inputs read"
        );
        Ok(inputs)
    }

    pub fn required_reserve(
        &self,
        desk: &ExchangeDesk,
        payments: &PaymentBook,
        credits: &dyn CreditLedger,
    ) -> SettlementResult<u64> {
        self.inputs(desk, payments, credits)?.required_reserve()
    }

    pub fn available_balance(
        &self,
        desk: &ExchangeDesk,
        payments: &PaymentBook,
        credits: &dyn CreditLedger,
    ) -> SettlementResult<u64> {
        self.inputs(desk, payments, credits)?.available_balance()
    }

    pub fn report(
        &self,
        desk: &ExchangeDesk,
        payments: &PaymentBook,
        credits: &dyn CreditLedger,
    ) -> SettlementResult<ReserveReport> {
        let inputs = self.inputs(desk, payments, credits)?;
        let required_reserve = inputs.required_reserve()?;
        Ok(ReserveReport {
            asset: self.asset,
            vault_balance: inputs.vault_balance,
            treasury_balance: desk.treasury_balance(&self.asset, payments),
            outstanding_supply: inputs.outstanding_supply,
            price: inputs.price,
            required_reserve,
            available_balance: inputs.vault_balance.saturating_sub(required_reserve),
            solvent: inputs.vault_balance >= required_reserve,
            generated_at: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Redemption
    // -----------------------------------------------------------------------

    /// Takes `amount` credit from `holder` and pays `amount * price`.
    ///
    /// Errors are reported in the order the checks run: `ZeroAmount`, then
    /// `UnsupportedAsset`, then `LowReserves` when the vault and treasury
    /// together fall short, then `Unauthorized` when a top-up is needed but
    /// the vault lacks its grant on the desk, then the credit ledger's
    /// refusal, then the voucher. A redemption the vault can cover on its
    /// own never consults the desk grant.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem(
        &mut self,
        holder: &AccountId,
        amount: u64,
        proof: &AuthorizationProof,
        verifier: &mut dyn AuthorizationVerifier,
        desk: &mut ExchangeDesk,
        payments: &mut PaymentBook,
        credits: &mut dyn CreditLedger,
        events: &mut EventLog,
    ) -> SettlementResult<Redemption> {
        if amount == 0 {
            return Err(SettlementError::ZeroAmount);
        }
        let price = desk
            .price_of(&self.asset)
            .ok_or(SettlementError::UnsupportedAsset(self.asset))?;
        let payout = scale(amount, price, "redemption payout")?;

        let balance = self.balance(payments);
        let needs_top_up = balance < payout;
        if needs_top_up {
            let reachable = balance.saturating_add(desk.treasury_balance(&self.asset, payments));
            if reachable < payout {
                warn!(%holder, payout, balance, reachable, "redemption exceeds reserves");
                return Err(SettlementError::LowReserves {
                    required: payout,
                    available: reachable,
                });
            }
            desk.access().require(Role::Withdrawer, &self.account)?;
        }
        credits.can_transfer_from(&self.account, holder, &self.account, amount)?;
        verifier.verify(AuthorizedAction::Redeem, holder, amount, proof)?;

        let mut topped_up = 0;
        if needs_top_up {
            topped_up = desk.withdraw_treasury(
                &self.account,
                &self.asset,
                TreasuryAmount::All,
                payments,
                events,
            )?;
            events.emit(SettlementEvent::ReserveToppedUp { amount: topped_up });
        }

        credits.transfer_from(&self.account, holder, &self.account, amount)?;
        payments.transfer(&self.asset, &self.account, holder, payout)?;

        info!(%holder, credits = amount, payout, topped_up, "credit redeemed");
        events.emit(SettlementEvent::Redeemed {
            holder: holder.clone(),
            credits: amount,
            payout,
        });

        Ok(Redemption {
            id: Uuid::new_v4(),
            holder: holder.clone(),
            credits: amount,
            price,
            payout,
            topped_up,
            executed_at: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Withdrawals
    // -----------------------------------------------------------------------

    /// Sends everything above the required reserve to `caller`.
    ///
    /// Requires `Withdrawer`. Returns the amount moved, which is zero when
    /// the vault is exactly funded.
    pub fn withdraw(
        &mut self,
        caller: &AccountId,
        desk: &ExchangeDesk,
        payments: &mut PaymentBook,
        credits: &dyn CreditLedger,
        events: &mut EventLog,
    ) -> SettlementResult<u64> {
        self.access.require(Role::Withdrawer, caller)?;

        let inputs = self.inputs(desk, payments, credits)?;
        let required_reserve = inputs.required_reserve()?;
        let surplus = inputs.withdrawable_surplus()?;
        if surplus > 0 {
            payments.transfer(&self.asset, &self.account, caller, surplus)?;
        }

        info!(%caller, amount = surplus, required_reserve, "surplus withdrawn");
        events.emit(SettlementEvent::SurplusWithdrawn {
            to: caller.clone(),
            amount: surplus,
            required_reserve,
        });
        Ok(surplus)
    }

    /// Sends the entire balance to `caller`, ignoring the reserve. Admin only.
    pub fn withdraw_all(
        &mut self,
        caller: &AccountId,
        payments: &mut PaymentBook,
        events: &mut EventLog,
    ) -> SettlementResult<u64> {
        self.access.require(Role::Admin, caller)?;

        let balance = self.balance(payments);
        if balance > 0 {
            payments.transfer(&self.asset, &self.account, caller, balance)?;
        }

        warn!(%caller, amount = balance, "reserve drained");
        events.emit(SettlementEvent::ReserveDrained {
            to: caller.clone(),
            amount: balance,
        });
        Ok(balance)
    }
}
