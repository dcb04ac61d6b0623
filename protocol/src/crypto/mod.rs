//! # Cryptographic Primitives
//!
//! Thin wrappers over audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for voucher signatures.
//! - **BLAKE3** for asset identifiers and signed digests.
//!
//! Nothing here is hand-rolled. If you're tempted to optimize these
//! functions, don't.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, hash_fields};
pub use keys::{KeyError, SignerKeypair, SignerPublicKey};
pub use signatures::{join_signature, split_signature, verify_raw, SignatureError};
