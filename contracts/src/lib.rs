//! # Reserve Settlement Contracts
//!
//! A credit system backed by a payment-asset reserve:
//!
//! - **Exchange Desk**: sells credit at an administered per-asset price
//!   and keeps the proceeds as its treasury.
//! - **Reserve Vault**: pays holders who return credit at the desk's
//!   current price, topping itself up from the treasury when short, and
//!   answers how much of its balance is surplus.
//! - **Settlement Engine**: owns both contracts plus the ledgers they
//!   settle against, and runs every call as an all-or-nothing transaction.
//!
//! ## Design Principles
//!
//! 1. All monetary arithmetic is checked. Overflow is an error, never a
//!    wrap.
//! 2. Solvency figures are computed from live ledger reads, never cached.
//! 3. Privileged calls name the role they need and check it against an
//!    explicit grant table.
//! 4. Every public type is serializable (serde) so a host can persist or
//!    ship it.
//! 5. Desk and vault calls check every leg before moving funds, so a call
//!    that fails leaves the ledgers as it found them.

pub mod authorization;
pub mod credit_ledger;
pub mod engine;
pub mod error;
pub mod events;
pub mod exchange_desk;
pub mod price_table;
pub mod reserve_vault;

pub use authorization::{
    AuthorizationError, AuthorizationProof, AuthorizationVerifier, AuthorizedAction,
    Ed25519VoucherVerifier, VoucherSigner,
};
pub use credit_ledger::{CreditLedger, CreditLedgerError, InMemoryCreditLedger};
pub use engine::{DefaultEngine, SettlementEngine, SharedEngine};
pub use error::{SettlementError, SettlementResult};
pub use events::{EventLog, SettlementEvent};
pub use exchange_desk::{ExchangeDesk, Purchase, TreasuryAmount};
pub use price_table::{PriceSource, PriceTable};
pub use reserve_vault::{Redemption, ReserveInputs, ReserveReport, ReserveVault};
