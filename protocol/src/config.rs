// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ledger Configuration & Constants
//!
//! Every magic number in the quorum ledger lives here. If you're hardcoding
//! a threshold or a timeout somewhere else, you're doing it wrong.
//!
//! Constants are the defaults. [`LedgerConfig`] is what the engine actually
//! reads, so an operator can change the quorum size without touching the
//! state machine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{AuthorizationPolicy, QuorumPolicy, RoleMatrix};

// ---------------------------------------------------------------------------
// Quorum Defaults
// ---------------------------------------------------------------------------

/// Signatures required before a transaction is approved (k in k-of-n).
pub const DEFAULT_REQUIRED_SIGNATURES: u32 = 3;

/// Size of the authorized approver pool (n in k-of-n).
pub const DEFAULT_APPROVER_POOL_SIZE: u32 = 5;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Upper bound on a single signature verification call.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on a single settlement call. Settlement talks to the outside
/// world, so it gets more room than verification.
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settlement claims older than this are presumed abandoned by a crashed
/// process and may be released by recovery.
pub const DEFAULT_CLAIM_EXPIRY: Duration = Duration::from_secs(300);

/// Session lifetime when the caller doesn't specify one.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(8 * 60 * 60);

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// How many times a mutation re-reads and retries after losing a
/// compare-and-set race before reporting contention.
pub const DEFAULT_MAX_CAS_RETRIES: u32 = 16;

/// Capacity of the in-process ledger event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Input Limits
// ---------------------------------------------------------------------------

/// Maximum recipient account identifier length in bytes.
pub const MAX_RECIPIENT_LENGTH: usize = 128;

/// Maximum free-text description length in bytes.
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Maximum rejection reason length in bytes.
pub const MAX_REASON_LENGTH: usize = 512;

/// Version of the record and digest formats. Bumped together with
/// [`DIGEST_DOMAIN_TAG`].
pub const PROTOCOL_VERSION: u32 = 1;

/// Domain tag prefixed to every canonical digest. Changing it invalidates
/// every outstanding signature, so don't.
pub const DIGEST_DOMAIN_TAG: &[u8] = b"QUORUM-TX-V1";

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration for the ledger.
///
/// Durations are stored as milliseconds so the JSON form stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Signatures required for approval (k).
    pub required_signatures: u32,
    /// Maximum number of signing-capable principals (n).
    pub approver_pool_size: u32,
    /// Signature verification timeout in milliseconds.
    pub verify_timeout_ms: u64,
    /// Settlement call timeout in milliseconds.
    pub settlement_timeout_ms: u64,
    /// Age in milliseconds after which a settlement claim counts as stale.
    pub claim_expiry_ms: u64,
    /// Compare-and-set retries before giving up with `Contention`.
    pub max_cas_retries: u32,
    /// Who may do what.
    pub roles: RoleMatrix,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            required_signatures: DEFAULT_REQUIRED_SIGNATURES,
            approver_pool_size: DEFAULT_APPROVER_POOL_SIZE,
            verify_timeout_ms: DEFAULT_VERIFY_TIMEOUT.as_millis() as u64,
            settlement_timeout_ms: DEFAULT_SETTLEMENT_TIMEOUT.as_millis() as u64,
            claim_expiry_ms: DEFAULT_CLAIM_EXPIRY.as_millis() as u64,
            max_cas_retries: DEFAULT_MAX_CAS_RETRIES,
            roles: RoleMatrix::default(),
        }
    }
}

impl LedgerConfig {
    /// Load a config from a JSON file. Missing fields fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the state machine can't honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.required_signatures == 0 {
            return Err(ConfigError::Invalid(
                "required_signatures must be at least 1".into(),
            ));
        }
        if self.required_signatures > self.approver_pool_size {
            return Err(ConfigError::Invalid(format!(
                "required_signatures ({}) exceeds approver_pool_size ({})",
                self.required_signatures, self.approver_pool_size
            )));
        }
        if self.verify_timeout_ms == 0 || self.settlement_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        // A claim must outlive the settlement call that holds it, or the
        // sweep could free it mid-call.
        if self.claim_expiry_ms <= self.settlement_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "claim_expiry_ms ({}) must exceed settlement_timeout_ms ({})",
                self.claim_expiry_ms, self.settlement_timeout_ms
            )));
        }
        if self.max_cas_retries == 0 {
            return Err(ConfigError::Invalid("max_cas_retries must be at least 1".into()));
        }
        if self.roles.sign.is_empty() {
            return Err(ConfigError::Invalid("no role is allowed to sign".into()));
        }
        Ok(())
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn settlement_timeout(&self) -> Duration {
        Duration::from_millis(self.settlement_timeout_ms)
    }

    pub fn claim_expiry(&self) -> Duration {
        Duration::from_millis(self.claim_expiry_ms)
    }

    /// The authorization policy this config describes.
    pub fn policy(&self) -> AuthorizationPolicy {
        AuthorizationPolicy::new(
            self.roles.clone(),
            QuorumPolicy {
                required_signatures: self.required_signatures,
                approver_pool_size: self.approver_pool_size,
            },
        )
    }
}
