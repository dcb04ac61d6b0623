//! # Ledger Module: Balances, Allowances, Identifiers
//!
//! Where value lives. The engine never stores a balance of its own; every
//! treasury and reserve figure is read from a ledger in this module.
//!
//! ```text
//! asset.rs        : AssetId (content-addressed) and AccountId (labels)
//! token_ledger.rs : single-asset balances, allowances, total supply
//! payment_book.rs : one TokenLedger per payment asset
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest-unit denomination.** No floating
//!    point anywhere near money.
//! 2. **Validate, then mutate.** A failed ledger call changes nothing.
//! 3. **Serializable state.** Everything derives `Serialize`/`Deserialize`
//!    so a host can snapshot or persist it.

pub mod asset;
pub mod payment_book;
pub mod token_ledger;

pub use asset::{AccountId, AssetId};
pub use payment_book::PaymentBook;
pub use token_ledger::{LedgerError, TokenLedger};
