// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256**: the canonical transaction digest. External signers
//!   (HSMs, browser wallets, command-line tools) all speak SHA-256, so the
//!   bytes approvers sign are a SHA-256 digest.
//!
//! - **BLAKE3**: internal integrity, i.e. the audit hash chain. Nobody
//!   outside the process ever needs to reproduce it, so we take the faster
//!   one.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use quorum_protocol::crypto::sha256;
///
/// let hash = sha256(b"quorum");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 over several parts without concatenating them first.
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` hash
/// differently.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
