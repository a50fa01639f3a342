// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Audit Trail
//!
//! Every mutating attempt (successful, denied or failed) is handed to an
//! [`AuditSink`] as an [`AuditEvent`]. Where those events end up is the
//! sink's business.
//!
//! [`MemoryAuditLog`] is the in-process sink behind `/api/audit/logs`. It is
//! hash-chained: each entry's hash is BLAKE3 over the previous entry's hash,
//! its sequence number and the canonical JSON of the event. Editing or
//! dropping any entry breaks every hash after it, which
//! [`MemoryAuditLog::verify_chain`] detects.
//!
//! ## Failure policy
//!
//! Audit happens after the state change has committed. A sink failure is
//! logged at `warn` and never un-commits anything.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::crypto::blake3_hash_multi;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateTransaction,
    SubmitSignature,
    ApproveTransaction,
    ExecuteTransaction,
    RejectTransaction,
    ReleaseClaim,
    RegisterPrincipal,
    IssueSession,
    InvalidateSession,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTransaction => "create_transaction",
            Self::SubmitSignature => "submit_signature",
            Self::ApproveTransaction => "approve_transaction",
            Self::ExecuteTransaction => "execute_transaction",
            Self::RejectTransaction => "reject_transaction",
            Self::ReleaseClaim => "release_claim",
            Self::RegisterPrincipal => "register_principal",
            Self::IssueSession => "issue_session",
            Self::InvalidateSession => "invalidate_session",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    /// Refused by authorization or signature verification.
    Denied,
    /// Refused for any other reason (state, validation, settlement).
    Failed,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::Failed => "failed",
        })
    }
}

/// One auditable fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Principal id of whoever attempted the action.
    pub actor: String,
    pub action: AuditAction,
    /// Transaction id, principal id or session owner the action targeted.
    pub target_id: String,
    pub outcome: AuditOutcome,
    /// Free-form context: error message, rejection reason, receipt ref.
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        target_id: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            actor: actor.into(),
            action,
            target_id: target_id.into(),
            outcome,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("audit serialization failed: {0}")]
    Serialization(String),

    #[error("audit chain broken at sequence {sequence}")]
    ChainBroken { sequence: u64 },
}

/// Append-only consumer of audit events.
pub trait AuditSink: Send + Sync {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError>;
}

// ---------------------------------------------------------------------------
// MemoryAuditLog
// ---------------------------------------------------------------------------

/// A chained entry as stored by [`MemoryAuditLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Zero-based position in the log.
    pub sequence: u64,
    #[serde(flatten)]
    pub event: AuditEvent,
    /// Hex hash of the previous entry; all zeros for the first.
    pub prev_hash: String,
    /// Hex BLAKE3 of (prev_hash, sequence, event).
    pub hash: String,
}

const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// In-process, hash-chained audit log.
///
/// Appends take a write lock for the duration of one hash; reads clone out
/// under a read lock.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    /// The newest `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn for_target(&self, target_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.event.target_id == target_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Recompute every link. `Err` names the first entry that doesn't match.
    pub fn verify_chain(&self) -> Result<(), AuditError> {
        let entries = self.entries.read();
        let mut prev = GENESIS_HASH;
        for entry in entries.iter() {
            let expected = chain_hash(&prev, entry.sequence, &entry.event)?;
            if entry.prev_hash != hex::encode(prev) || entry.hash != hex::encode(expected) {
                return Err(AuditError::ChainBroken {
                    sequence: entry.sequence,
                });
            }
            prev = expected;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, f: impl FnOnce(&mut AuditEntry)) {
        f(&mut self.entries.write()[index]);
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut entries = self.entries.write();
        let prev = match entries.last() {
            Some(last) => decode_hash(&last.hash)?,
            None => GENESIS_HASH,
        };
        let sequence = entries.len() as u64;
        let hash = chain_hash(&prev, sequence, &event)?;

        info!(
            target: "quorum::audit",
            sequence,
            actor = %event.actor,
            action = %event.action,
            target_id = %event.target_id,
            outcome = %event.outcome,
            "audit"
        );

        entries.push(AuditEntry {
            sequence,
            event,
            prev_hash: hex::encode(prev),
            hash: hex::encode(hash),
        });
        Ok(())
    }
}

fn chain_hash(prev: &[u8; 32], sequence: u64, event: &AuditEvent) -> Result<[u8; 32], AuditError> {
    let canonical =
        serde_json::to_vec(event).map_err(|e| AuditError::Serialization(e.to_string()))?;
    Ok(blake3_hash_multi(&[
        prev.as_slice(),
        &sequence.to_le_bytes(),
        canonical.as_slice(),
    ]))
}

fn decode_hash(hex_hash: &str) -> Result<[u8; 32], AuditError> {
    let raw = hex::decode(hex_hash).map_err(|e| AuditError::Serialization(e.to_string()))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| AuditError::Serialization("audit hash is not 32 bytes".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(target: &str, outcome: AuditOutcome) -> AuditEvent {
        AuditEvent::new("bob", AuditAction::SubmitSignature, target, outcome)
    }

    #[test]
    fn appends_are_chained() {
        let log = MemoryAuditLog::new();
        log.append(event("tx-1", AuditOutcome::Success)).unwrap();
        log.append(event("tx-1", AuditOutcome::Denied)).unwrap();
        log.append(event("tx-2", AuditOutcome::Success)).unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].prev_hash, hex::encode(GENESIS_HASH));
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[2].sequence, 2);
        assert!(log.verify_chain().is_ok());
    }

    #[test]
    fn tampering_is_detected() {
        let log = MemoryAuditLog::new();
        for _ in 0..4 {
            log.append(event("tx-1", AuditOutcome::Success)).unwrap();
        }
        log.tamper(2, |e| e.event.outcome = AuditOutcome::Denied);
        assert!(matches!(
            log.verify_chain(),
            Err(AuditError::ChainBroken { sequence: 2 })
        ));
    }

    #[test]
    fn for_target_and_recent() {
        let log = MemoryAuditLog::new();
        log.append(event("tx-1", AuditOutcome::Success)).unwrap();
        log.append(event("tx-2", AuditOutcome::Failed)).unwrap();
        log.append(event("tx-1", AuditOutcome::Denied)).unwrap();

        assert_eq!(log.for_target("tx-1").len(), 2);
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sequence, 2);
    }

    #[test]
    fn entry_json_is_flat() {
        let log = MemoryAuditLog::new();
        log.append(event("tx-9", AuditOutcome::Denied).with_detail("bad signature"))
            .unwrap();
        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["target_id"], "tx-9");
        assert_eq!(json["outcome"], "denied");
        assert_eq!(json["action"], "submit_signature");
        assert_eq!(json["detail"], "bad signature");
    }
}
