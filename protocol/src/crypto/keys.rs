//! # Key Management
//!
//! Ed25519 keypairs for the parties that sign authorization vouchers.
//!
//! Only one kind of participant in the engine holds a signing key: the
//! voucher signer registered at setup. Everyone else is identified by an
//! account label. This module keeps the signing key behind a small wrapper
//! so that key bytes never end up in logs or serialized state.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged. `Debug` prints the public half only.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// An Ed25519 keypair used to sign vouchers.
///
/// Intentionally does NOT implement `Serialize`. Exporting a secret key
/// should be an explicit call to [`secret_key_bytes`](Self::secret_key_bytes).
pub struct SignerKeypair {
    signing_key: SigningKey,
}

/// The public half of a [`SignerKeypair`]. Safe to store in config and state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerPublicKey {
    bytes: [u8; 32],
}

impl SignerKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair deterministically from a 32-byte seed.
    ///
    /// The seed is the Ed25519 secret key. A weak seed gives a weak key.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a hex-encoded 32-byte secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// The public key for this keypair.
    pub fn public_key(&self) -> SignerPublicKey {
        SignerPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign `message`, returning the raw 64-byte signature.
    ///
    /// Ed25519 is deterministic: the same key and message always give the
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Exports the raw 32-byte secret key. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }
}

impl Clone for SignerKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for SignerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material.
        write!(f, "SignerKeypair(pub={})", self.public_key().to_hex())
    }
}

impl SignerPublicKey {
    /// Wrap raw bytes without validating the curve point.
    ///
    /// Invalid points are caught at verification time, where they simply
    /// fail to verify.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse and validate a hex-encoded public key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidPublicKey)?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Returns `true` if `signature` is a valid signature over `message`.
    ///
    /// Strict verification: weak keys and small-order `R` values fail.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let signature = DalekSignature::from_bytes(signature);
        verifying_key.verify_strict(message, &signature).is_ok()
    }

    /// Hex-encoded representation. 64 characters for 32 bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for SignerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerPublicKey({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for SignerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_keypairs_are_deterministic() {
        let a = SignerKeypair::from_seed(&[7u8; 32]);
        let b = SignerKeypair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"voucher"), b.sign(b"voucher"));
    }

    #[test]
    fn sign_and_verify() {
        let kp = SignerKeypair::generate();
        let sig = kp.sign(b"redeem 2");
        assert!(kp.public_key().verify(b"redeem 2", &sig));
        assert!(!kp.public_key().verify(b"redeem 3", &sig));
    }

    #[test]
    fn hex_roundtrip() {
        let kp = SignerKeypair::generate();
        let restored = SignerKeypair::from_hex(&hex::encode(kp.secret_key_bytes())).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());

        let pk = SignerPublicKey::from_hex(&kp.public_key().to_hex()).unwrap();
        assert_eq!(pk, kp.public_key());
    }

    #[test]
    fn malformed_hex_rejected() {
        assert!(SignerKeypair::from_hex("abcd").is_err());
        assert!(SignerPublicKey::from_hex("zz").is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let kp = SignerKeypair::from_seed(&[1u8; 32]);
        let printed = format!("{:?}", kp);
        assert!(!printed.contains(&hex::encode([1u8; 32])));
    }

    #[test]
    fn zero_signature_never_verifies() {
        let kp = SignerKeypair::generate();
        assert!(!kp.public_key().verify(b"anything", &[0u8; 64]));
    }
}
