//! # Digital Signatures
//!
//! Verification of Ed25519 signatures that arrive as raw byte fields.
//!
//! Vouchers carry their signature split across two 32-byte fields. This
//! module joins them back together and checks them against a public key,
//! returning a typed error instead of a bare boolean so callers can log
//! *that* verification failed without saying *why*.

use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use thiserror::Error;

use super::keys::SignerPublicKey;

/// Errors during signature verification.
///
/// Intentionally vague. We don't hand out a detailed error oracle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Join the two halves of a split Ed25519 signature.
pub fn join_signature(r: &[u8; 32], s: &[u8; 32]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(r);
    out[32..].copy_from_slice(s);
    out
}

/// Split a 64-byte Ed25519 signature into its `(R, s)` halves.
pub fn split_signature(signature: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&signature[..32]);
    s.copy_from_slice(&signature[32..]);
    (r, s)
}

/// Verify a signature given as raw bytes against `public_key`.
///
/// Uses strict verification: small-order keys and `R` points are rejected,
/// which is what keeps an all-zero signature from ever passing.
pub fn verify_raw(
    public_key: &SignerPublicKey,
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key.as_bytes()).map_err(|_| SignatureError::InvalidPublicKey)?;

    verifying_key
        .verify_strict(message, &DalekSignature::from_bytes(signature))
        .map_err(|_| SignatureError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::SignerKeypair;

    #[test]
    fn split_join_is_identity() {
        let kp = SignerKeypair::generate();
        let sig = kp.sign(b"msg");
        let (r, s) = split_signature(&sig);
        assert_eq!(join_signature(&r, &s), sig);
    }

    #[test]
    fn verify_raw_accepts_valid_signature() {
        let kp = SignerKeypair::generate();
        let sig = kp.sign(b"consume 5");
        assert!(verify_raw(&kp.public_key(), b"consume 5", &sig).is_ok());
    }

    #[test]
    fn verify_raw_rejects_tampered_message() {
        let kp = SignerKeypair::generate();
        let sig = kp.sign(b"consume 5");
        assert_eq!(
            verify_raw(&kp.public_key(), b"consume 6", &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn verify_raw_rejects_identity_point() {
        // All zeros is a small-order point; strict parsing or verification rejects it.
        let bad = SignerPublicKey::from_bytes([0u8; 32]);
        assert!(verify_raw(&bad, b"m", &[0u8; 64]).is_err());
    }
}
