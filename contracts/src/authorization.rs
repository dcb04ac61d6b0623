//! # Authorization Proofs
//!
//! Redeeming and consuming credit both require an [`AuthorizationProof`]: a
//! voucher from an off-engine authority saying "this account may move this
//! much credit, until this deadline". The engine does not care how the
//! authority decides; it only asks an [`AuthorizationVerifier`] whether the
//! proof holds.
//!
//! ## Voucher format
//!
//! The bundled verifier expects `r || s` to be an Ed25519 signature, by the
//! configured signer, over the BLAKE3 digest of
//!
//! ```text
//! domain | action | account | amount | stage | nonce | deadline
//! ```
//!
//! with every field length-prefixed (see [`hash_fields`]). Binding the
//! domain, action, account, and amount means a voucher cannot be replayed
//! against a different engine, operation, holder, or size.
//!
//! ## Rejections
//!
//! - An all-zero proof is rejected outright.
//! - A deadline in the past, or further out than the configured maximum
//!   lifetime, is rejected.
//! - Each `(account, nonce)` pair verifies at most once.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use reserve_protocol::crypto::{
    hash_fields, join_signature, split_signature, verify_raw, SignerKeypair, SignerPublicKey,
};
use reserve_protocol::ledger::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a proof was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// Every field of the proof is zero.
    #[error("empty authorization proof")]
    EmptyProof,

    /// The deadline has passed.
    #[error("authorization expired at {deadline} (now {now})")]
    Expired {
        /// Deadline carried by the proof, unix seconds.
        deadline: u64,
        /// Verifier's clock, unix seconds.
        now: u64,
    },

    /// The deadline is further out than the verifier accepts.
    #[error("authorization deadline {deadline} exceeds the limit {limit}")]
    DeadlineTooFar {
        /// Deadline carried by the proof.
        deadline: u64,
        /// Latest deadline the verifier accepts right now.
        limit: u64,
    },

    /// The nonce was already used by this account.
    #[error("authorization nonce {nonce} already used by {account}")]
    Replayed {
        /// The account the proof was for.
        account: AccountId,
        /// The reused nonce.
        nonce: u64,
    },

    /// The signature does not verify against the configured signer.
    #[error("authorization signature invalid")]
    BadSignature,
}

// ---------------------------------------------------------------------------
// Proof
// ---------------------------------------------------------------------------

/// The operation a voucher authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizedAction {
    /// Return credit to the vault for payment.
    Redeem,
    /// Retire credit without payment.
    Consume,
}

impl AuthorizedAction {
    fn tag(self) -> &'static [u8] {
        match self {
            AuthorizedAction::Redeem => b"redeem",
            AuthorizedAction::Consume => b"consume",
        }
    }
}

/// Voucher presented with a redeem or consume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationProof {
    /// Issuer-defined stage marker, bound into the signed digest.
    pub stage: u8,
    /// Per-account replay counter.
    pub nonce: u64,
    /// Unix seconds after which the voucher is void.
    pub deadline: u64,
    /// First half of the signature.
    pub r: [u8; 32],
    /// Second half of the signature.
    pub s: [u8; 32],
}

impl AuthorizationProof {
    /// The all-zero proof. Never valid.
    pub const EMPTY: AuthorizationProof = AuthorizationProof {
        stage: 0,
        nonce: 0,
        deadline: 0,
        r: [0u8; 32],
        s: [0u8; 32],
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// The full 64-byte signature.
    pub fn signature(&self) -> [u8; 64] {
        join_signature(&self.r, &self.s)
    }
}

/// Digest a voucher signs.
pub fn voucher_digest(
    domain: &str,
    action: AuthorizedAction,
    account: &AccountId,
    amount: u64,
    stage: u8,
    nonce: u64,
    deadline: u64,
) -> [u8; 32] {
    hash_fields(
        domain,
        &[
            action.tag(),
            account.as_str().as_bytes(),
            &amount.to_be_bytes(),
            &[stage],
            &nonce.to_be_bytes(),
            &deadline.to_be_bytes(),
        ],
    )
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Decides whether a proof authorizes an operation.
///
/// Verification takes `&mut self` so implementations can record spent
/// nonces. A stateful verifier also journals what it accepts: the engine
/// takes a [`checkpoint`](Self::checkpoint) before each operation, then
/// calls [`commit`](Self::commit) if it succeeds or
/// [`rollback`](Self::rollback) if it aborts, so a nonce spent by an
/// aborted operation is spendable again. Stateless verifiers keep the
/// no-op defaults.
pub trait AuthorizationVerifier {
    fn verify(
        &mut self,
        action: AuthorizedAction,
        account: &AccountId,
        amount: u64,
        proof: &AuthorizationProof,
    ) -> Result<(), AuthorizationError>;

    /// Marks the current journal position.
    fn checkpoint(&self) -> usize {
        0
    }

    /// Forgets every proof accepted since `checkpoint` returned `mark`.
    fn rollback(&mut self, mark: usize) {
        let _ = mark;
    }

    /// Makes everything accepted so far permanent and clears the journal.
    fn commit(&mut self) {}
}

/// Verifies Ed25519 vouchers from a single signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519VoucherVerifier {
    signer: SignerPublicKey,
    domain: String,
    max_ttl_secs: u64,
    used_nonces: BTreeMap<AccountId, BTreeSet<u64>>,
    /// Nonces accepted since the last commit, oldest first.
    #[serde(skip)]
    journal: Vec<(AccountId, u64)>,
}

impl Ed25519VoucherVerifier {
    pub fn new(signer: SignerPublicKey, domain: impl Into<String>, max_ttl_secs: u64) -> Self {
        Self {
            signer,
            domain: domain.into(),
            max_ttl_secs,
            used_nonces: BTreeMap::new(),
            journal: Vec::new(),
        }
    }

    /// The public key vouchers must be signed by.
    pub fn signer(&self) -> &SignerPublicKey {
        &self.signer
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns `true` if `nonce` was already accepted for `account`.
    pub fn is_used(&self, account: &AccountId, nonce: u64) -> bool {
        self.used_nonces
            .get(account)
            .map(|nonces| nonces.contains(&nonce))
            .unwrap_or(false)
    }

    /// Verifies `proof` against an explicit clock reading.
    pub fn verify_at(
        &mut self,
        now: u64,
        action: AuthorizedAction,
        account: &AccountId,
        amount: u64,
        proof: &AuthorizationProof,
    ) -> Result<(), AuthorizationError> {
        if proof.is_empty() {
            return Err(AuthorizationError::EmptyProof);
        }
        if proof.deadline < now {
            return Err(AuthorizationError::Expired {
                deadline: proof.deadline,
                now,
            });
        }
        let limit = now.saturating_add(self.max_ttl_secs);
        if proof.deadline > limit {
            return Err(AuthorizationError::DeadlineTooFar {
                deadline: proof.deadline,
                limit,
            });
        }
        if self.is_used(account, proof.nonce) {
            return Err(AuthorizationError::Replayed {
                account: account.clone(),
                nonce: proof.nonce,
            });
        }

        let digest = voucher_digest(
            &self.domain,
            action,
            account,
            amount,
            proof.stage,
            proof.nonce,
            proof.deadline,
        );
        if verify_raw(&self.signer, &digest, &proof.signature()).is_err() {
            warn!(%account, nonce = proof.nonce, "voucher signature rejected");
            return Err(AuthorizationError::BadSignature);
        }

        self.used_nonces
            .entry(account.clone())
            .or_default()
            .insert(proof.nonce);
        self.journal.push((account.clone(), proof.nonce));
        debug!(%account, ?action, amount, nonce = proof.nonce, "voucher accepted");
        Ok(())
    }
}

impl AuthorizationVerifier for Ed25519VoucherVerifier {
    fn verify(
        &mut self,
        action: AuthorizedAction,
        account: &AccountId,
        amount: u64,
        proof: &AuthorizationProof,
    ) -> Result<(), AuthorizationError> {
        self.verify_at(unix_now(), action, account, amount, proof)
    }

    fn checkpoint(&self) -> usize {
        self.journal.len()
    }

    fn rollback(&mut self, mark: usize) {
        for (account, nonce) in self.journal.drain(mark.min(self.journal.len())..) {
            if let Some(nonces) = self.used_nonces.get_mut(&account) {
                nonces.remove(&nonce);
                if nonces.is_empty() {
                    self.used_nonces.remove(&account);
                }
            }
            debug!(%account, nonce, "voucher nonce released");
        }
    }

    fn commit(&mut self) {
        self.journal.clear();
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Issues vouchers. Lives with the authority, not the engine.
#[derive(Debug, Clone)]
pub struct VoucherSigner {
    keypair: SignerKeypair,
    domain: String,
}

impl VoucherSigner {
    pub fn new(keypair: SignerKeypair, domain: impl Into<String>) -> Self {
        Self {
            keypair,
            domain: domain.into(),
        }
    }

    /// The key a matching verifier must be configured with.
    pub fn public_key(&self) -> SignerPublicKey {
        self.keypair.public_key()
    }

    /// A verifier that accepts this signer's vouchers.
    pub fn verifier(&self, max_ttl_secs: u64) -> Ed25519VoucherVerifier {
        Ed25519VoucherVerifier::new(self.public_key(), self.domain.clone(), max_ttl_secs)
    }

    /// Signs a voucher with every field explicit.
    pub fn sign(
        &self,
        action: AuthorizedAction,
        account: &AccountId,
        amount: u64,
        stage: u8,
        nonce: u64,
        deadline: u64,
    ) -> AuthorizationProof {
        let digest = voucher_digest(&self.domain, action, account, amount, stage, nonce, deadline);
        let (r, s) = split_signature(&self.keypair.sign(&digest));
        AuthorizationProof {
            stage,
            nonce,
            deadline,
            r,
            s,
        }
    }

    /// Signs a stage-0 voucher valid for `ttl_secs` from now.
    pub fn issue(
        &self,
        action: AuthorizedAction,
        account: &AccountId,
        amount: u64,
        nonce: u64,
        ttl_secs: u64,
    ) -> AuthorizationProof {
        let deadline = unix_now().saturating_add(ttl_secs);
        self.sign(action, account, amount, 0, nonce, deadline)
    }
}

/// Current unix time in whole seconds, clamped at zero.
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
