// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Error taxonomy for every ledger operation.
//!
//! Validation, authorization and crypto failures are local: they surface
//! immediately and never touch stored state. Settlement failures leave the
//! record `approved` so the caller can try again. A signer resubmitting is
//! not an error at all; see [`crate::coordinator::SignatureOutcome`].

use thiserror::Error;

use crate::storage::StoreError;
use crate::transaction::TransactionStatus;

/// Convenience alias used across the crate.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Everything that can go wrong in the quorum ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed request (bad amount, empty recipient, oversized text...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller's role or ownership doesn't permit the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The signature blob did not verify against the signer's public key.
    #[error("invalid signature from {signer}")]
    InvalidSignature {
        /// Principal whose signature was rejected.
        signer: String,
    },

    /// The operation is not allowed from the transaction's current status.
    #[error("invalid state: transaction {tx_id} is {status}, {reason}")]
    InvalidState {
        /// Transaction the operation targeted.
        tx_id: String,
        /// Status observed when the operation was refused.
        status: TransactionStatus,
        /// Human-readable explanation.
        reason: String,
    },

    /// The settlement boundary reported failure. Status stays `approved`.
    #[error("settlement failed for {tx_id}: {reason}")]
    SettlementFailure {
        /// Transaction whose settlement failed.
        tx_id: String,
        /// What the boundary (or the timeout) said.
        reason: String,
        /// Whether the caller may simply retry `execute`.
        retryable: bool,
    },

    /// No transaction (or principal) with that id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator call exceeded its time budget. Nothing was mutated.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// The call that timed out.
        operation: &'static str,
        /// The budget that was exceeded.
        after_ms: u64,
    },

    /// Lost the compare-and-set race too many times in a row.
    #[error("contention on {tx_id}: gave up after {attempts} attempts")]
    Contention {
        /// The contended transaction.
        tx_id: String,
        /// How many commits were attempted.
        attempts: u32,
    },

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns `true` if the same call may succeed when simply repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Contention { .. } => true,
            Self::SettlementFailure { retryable, .. } => *retryable,
            Self::Validation(_)
            | Self::Unauthorized(_)
            | Self::InvalidSignature { .. }
            | Self::InvalidState { .. }
            | Self::NotFound(_)
            | Self::Store(_) => false,
        }
    }

    /// Short machine-readable error kind, used by the HTTP layer and audit.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::InvalidState { .. } => "invalid_state",
            Self::SettlementFailure { .. } => "settlement_failure",
            Self::NotFound(_) => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::Contention { .. } => "contention",
            Self::Store(_) => "store",
        }
    }
}
