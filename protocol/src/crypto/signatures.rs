// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Signature Verification
//!
//! The ledger consumes verification as a capability: [`CryptoVerifier`].
//! It is async because in real deployments the check may live behind an
//! HSM or a remote service, and the coordinator puts a timeout around it.
//!
//! [`Ed25519Verifier`] is the in-process implementation. Strict
//! verification is used throughout; we reject edge-case signatures that
//! lenient implementations accept.

use async_trait::async_trait;
use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use thiserror::Error;

use super::keys::SignerPublicKey;

/// Errors during raw signature checks.
///
/// Intentionally vague: we don't tell attackers why verification failed.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Pluggable signature verification.
///
/// Implementations must be side-effect free: the same inputs always give
/// the same answer, which is what makes coordinator retries safe.
#[async_trait]
pub trait CryptoVerifier: Send + Sync {
    /// Returns `true` iff `signature` is a valid signature over `payload`
    /// by the holder of `public_key`.
    async fn verify(&self, payload: &[u8], signature: &[u8], public_key: &SignerPublicKey)
        -> bool;
}

/// Ed25519 verification using `ed25519-dalek` strict mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

#[async_trait]
impl CryptoVerifier for Ed25519Verifier {
    async fn verify(
        &self,
        payload: &[u8],
        signature: &[u8],
        public_key: &SignerPublicKey,
    ) -> bool {
        verify_raw(public_key.as_bytes(), payload, signature).is_ok()
    }
}

/// Verify a signature from raw byte components.
///
/// The "I got these bytes off the wire" variant: parses the key and the
/// signature, then runs strict verification.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let sig_arr: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;
    let signature = DalekSignature::from_bytes(&sig_arr);

    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
