// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cryptographic Primitives
//!
//! The ledger never invents cryptography. It hashes immutable transaction
//! fields into a canonical digest and asks a [`CryptoVerifier`] whether a
//! signature blob over that digest is good. Everything here is a thin,
//! type-safe wrapper around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for approver signatures.
//! - **SHA-256** for the canonical transaction digest.
//! - **BLAKE3** for the audit hash chain.
//!
//! The verifier is a trait so a deployment can plug in an HSM, a remote
//! signing service, or whatever its key custody demands.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, blake3_hash_multi, sha256, sha256_array};
pub use keys::{KeyError, SignerKeypair, SignerPublicKey};
pub use signatures::{verify_raw, CryptoVerifier, Ed25519Verifier, SignatureError};
