//! # Settlement Events
//!
//! Contracts announce every state change by appending a [`SettlementEvent`]
//! to an [`EventLog`]. The log lives inside the engine's transactional
//! state, so events from an aborted operation disappear with the rollback
//! and the log only ever describes what actually happened.

use chrono::{DateTime, Utc};
use reserve_protocol::access::Role;
use reserve_protocol::ledger::{AccountId, AssetId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which contract an administrative event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// The exchange desk.
    Desk,
    /// The reserve vault.
    Vault,
}

/// Something that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// The desk's price for `asset` changed. A zero price disables the asset.
    PriceUpdated {
        asset: AssetId,
        price: u64,
        previous: Option<u64>,
        by: AccountId,
    },
    /// A buyer paid `cost` of `asset` and received `quantity` credit.
    Purchased {
        buyer: AccountId,
        asset: AssetId,
        quantity: u64,
        cost: u64,
    },
    /// A capability holder pulled `amount` from the desk treasury.
    TreasuryWithdrawn {
        asset: AssetId,
        to: AccountId,
        amount: u64,
    },
    /// The vault topped itself up from the desk treasury during a redemption.
    ReserveToppedUp { amount: u64 },
    /// A holder returned `credits` and was paid `payout`.
    Redeemed {
        holder: AccountId,
        credits: u64,
        payout: u64,
    },
    /// A holder retired `credits` outside of redemption.
    CreditsConsumed { holder: AccountId, credits: u64 },
    /// The withdrawer took the surplus above the required reserve.
    SurplusWithdrawn {
        to: AccountId,
        amount: u64,
        required_reserve: u64,
    },
    /// The owner drained the vault, bypassing the reserve check.
    ReserveDrained { to: AccountId, amount: u64 },
    /// A role was granted on a component.
    RoleGranted {
        component: Component,
        role: Role,
        account: AccountId,
    },
    /// A role was revoked on a component.
    RoleRevoked {
        component: Component,
        role: Role,
        account: AccountId,
    },
}

impl SettlementEvent {
    /// Short name of the event, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementEvent::PriceUpdated { .. } => "price_updated",
            SettlementEvent::Purchased { .. } => "purchased",
            SettlementEvent::TreasuryWithdrawn { .. } => "treasury_withdrawn",
            SettlementEvent::ReserveToppedUp { .. } => "reserve_topped_up",
            SettlementEvent::Redeemed { .. } => "redeemed",
            SettlementEvent::CreditsConsumed { .. } => "credits_consumed",
            SettlementEvent::SurplusWithdrawn { .. } => "surplus_withdrawn",
            SettlementEvent::ReserveDrained { .. } => "reserve_drained",
            SettlementEvent::RoleGranted { .. } => "role_granted",
            SettlementEvent::RoleRevoked { .. } => "role_revoked",
        }
    }
}

/// A sequenced, timestamped event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
    /// The event itself.
    pub event: SettlementEvent,
}

/// Append-only list of settlement events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event`.
    pub fn emit(&mut self, event: SettlementEvent) {
        let sequence = self.records.len() as u64;
        debug!(sequence, kind = event.kind(), "settlement event");
        self.records.push(EventRecord {
            sequence,
            recorded_at: Utc::now(),
            event,
        });
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Iterator over the bare events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &SettlementEvent> {
        self.records.iter().map(|r| &r.event)
    }

    /// The most recent event.
    pub fn last(&self) -> Option<&SettlementEvent> {
        self.records.last().map(|r| &r.event)
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record from position `len` on.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}
