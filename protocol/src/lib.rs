// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Reserve Protocol: Core Primitives
//!
//! The building blocks the exchange desk and reserve vault contracts are
//! written against. Nothing in here knows about prices or reserves; it
//! knows about balances, who may move them, and how to check a signature.
//!
//! ## Architecture
//!
//! - **ledger**: Asset/account identifiers, the fungible token ledger,
//!   and the multi-asset payment book.
//! - **access**: Roles and capability grants.
//! - **crypto**: Ed25519 keys and signatures, BLAKE3 hashing.
//! - **config**: Constants and the engine's startup configuration.
//! - **logging**: `tracing` subscriber setup for hosts.
//!
//! ## Design Philosophy
//!
//! 1. Integer money only. `u64` minor units, checked arithmetic.
//! 2. A failed call changes nothing.
//! 3. If it touches money, it has tests. Plural.

pub mod access;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod logging;

pub use access::{AccessControl, AccessError, Role};
pub use config::{ConfigError, EngineConfig};
pub use ledger::{AccountId, AssetId, LedgerError, PaymentBook, TokenLedger};
