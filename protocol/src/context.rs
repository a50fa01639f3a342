// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Collaborators shared by the coordinator and the gate, plus the
//! optimistic update loop both of them commit through.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink};
use crate::config::LedgerConfig;
use crate::crypto::CryptoVerifier;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{IdentityDirectory, Principal, Session};
use crate::ledger::LedgerEvent;
use crate::policy::AuthorizationPolicy;
use crate::settlement::SettlementBoundary;
use crate::storage::{CasOutcome, TransactionStore};
use crate::transaction::Transaction;

/// What a derive step wants done with the record it was shown.
pub(crate) enum Step<T> {
    /// Commit this successor record.
    Commit(Transaction, T),
    /// Nothing to write; the record already reflects the request.
    Unchanged(T),
}

/// Result of [`LedgerContext::update`].
pub(crate) struct Applied<T> {
    /// The stored record after the call: the committed successor, or the
    /// current record if nothing was written.
    pub record: Transaction,
    pub value: T,
    pub committed: bool,
}

#[derive(Clone)]
pub(crate) struct LedgerContext {
    pub store: Arc<dyn TransactionStore>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub verifier: Arc<dyn CryptoVerifier>,
    pub settlement: Arc<dyn SettlementBoundary>,
    pub audit: Arc<dyn AuditSink>,
    pub policy: Arc<AuthorizationPolicy>,
    pub config: Arc<LedgerConfig>,
    pub events: broadcast::Sender<LedgerEvent>,
}

impl LedgerContext {
    /// Resolve the caller behind a session. Expired sessions and unknown
    /// principals are `Unauthorized`.
    pub async fn principal(&self, session: &Session) -> LedgerResult<Principal> {
        if session.is_expired(Utc::now()) {
            return Err(LedgerError::Unauthorized("session expired".into()));
        }
        Ok(self.directory.resolve(&session.principal_id).await?)
    }

    pub fn load(&self, tx_id: &str) -> LedgerResult<Transaction> {
        self.store
            .get(tx_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {tx_id}")))
    }

    /// Read-derive-swap until the swap lands, the derive step declines, or
    /// the retry budget runs out.
    ///
    /// `derive` must be pure: it may run once per attempt, each time against
    /// a fresher record.
    pub fn update<T>(
        &self,
        mut current: Transaction,
        mut derive: impl FnMut(&Transaction) -> LedgerResult<Step<T>>,
    ) -> LedgerResult<Applied<T>> {
        let max_attempts = self.config.max_cas_retries.max(1);
        for attempt in 1..=max_attempts {
            let (next, value) = match derive(&current)? {
                Step::Unchanged(value) => {
                    return Ok(Applied {
                        record: current,
                        value,
                        committed: false,
                    })
                }
                Step::Commit(next, value) => (next, value),
            };

            match self.store.compare_and_swap(&current, &next)? {
                CasOutcome::Committed => {
                    return Ok(Applied {
                        record: next,
                        value,
                        committed: true,
                    })
                }
                CasOutcome::Conflict(Some(winner)) => {
                    debug!(
                        tx_id = %current.id,
                        attempt,
                        seen = current.version,
                        now = winner.version,
                        "lost compare-and-swap, retrying"
                    );
                    current = *winner;
                }
                CasOutcome::Conflict(None) => {
                    return Err(LedgerError::NotFound(format!("transaction {}", current.id)));
                }
            }
        }

        warn!(tx_id = %current.id, attempts = max_attempts, "giving up after repeated contention");
        Err(LedgerError::Contention {
            tx_id: current.id,
            attempts: max_attempts,
        })
    }

    /// Record an audit event. The state change (if any) is already
    /// committed, so a failing sink is logged and otherwise ignored.
    pub fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.append(event) {
            warn!(error = %e, "audit sink rejected event");
        }
    }

    /// Audit a refused or failed attempt with the error as detail.
    pub fn audit_error(&self, actor: &str, action: AuditAction, target: &str, err: &LedgerError) {
        let outcome = match err {
            LedgerError::Unauthorized(_) | LedgerError::InvalidSignature { .. } => {
                AuditOutcome::Denied
            }
            _ => AuditOutcome::Failed,
        };
        self.audit(AuditEvent::new(actor, action, target, outcome).with_detail(err.to_string()));
    }

    /// Publish to subscribers. No subscribers is fine.
    pub fn emit(&self, event: LedgerEvent) {
        let _ = self.events.send(event);
    }
}
