// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Execution Gate
//!
//! Owns the way out of `approved`: execution (with settlement) and
//! rejection.
//!
//! ## Design
//!
//! Execution is a two-phase commit against one record:
//!
//! ```text
//! approved ──claim (CAS)──▶ approved + claim ──settle ok──▶ executed
//!                                 │
//!                                 └──settle failed / timed out──▶ approved
//! ```
//!
//! The claim is the compare-and-set the exactly-once guarantee hangs on.
//! Of two concurrent `execute` calls exactly one installs it; the other
//! re-reads, sees "settlement in progress" and gets `InvalidState`. Status
//! stays `approved` while the claim is held, and `executed` is committed
//! only together with `executed_at` and the settlement receipt, so there is
//! never an `executed` record without a settlement behind it.
//!
//! The settle phase runs on its own task, so a caller that stops waiting
//! doesn't strand the claim: the task still commits `executed` or releases
//! the claim. If the process dies while holding a claim,
//! [`ExecutionGate::release_stale_claims`] frees it once it is older than
//! the claim expiry. A retry after that is safe because the settlement
//! boundary deduplicates on the transaction id.
//!
//! Only a declined settlement comes back non-retryable.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::audit::{AuditAction, AuditEvent, AuditOutcome};
use crate::context::{LedgerContext, Step};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{Principal, Session};
use crate::ledger::LedgerEvent;
use crate::settlement::{SettlementClaim, SettlementInstruction, SettlementReceipt};
use crate::transaction::{Transaction, TransactionStatus, TransactionView};

/// Actor recorded for maintenance the ledger does on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// A completed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub transaction: TransactionView,
    pub receipt: SettlementReceipt,
    /// Wall time spent in the settlement call.
    pub settlement_latency_ms: u64,
}

pub struct ExecutionGate {
    ctx: LedgerContext,
}

impl ExecutionGate {
    pub(crate) fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    // -----------------------------------------------------------------------
    // execute
    // -----------------------------------------------------------------------

    pub async fn execute(&self, session: &Session, tx_id: &str) -> LedgerResult<ExecutionResult> {
        let requester = match self.ctx.principal(session).await {
            Ok(p) => p,
            Err(e) => {
                self.ctx
                    .audit_error(&session.principal_id, AuditAction::ExecuteTransaction, tx_id, &e);
                return Err(e);
            }
        };

        let result = self.execute_as(&requester, tx_id).await;
        if let Err(e) = &result {
            self.ctx
                .audit_error(&requester.id, AuditAction::ExecuteTransaction, tx_id, e);
        }
        result
    }

    async fn execute_as(&self, requester: &Principal, tx_id: &str) -> LedgerResult<ExecutionResult> {
        let current = self.ctx.load(tx_id)?;

        // Authorization before state.
        if !self.ctx.policy.can_execute(requester, &current) {
            warn!(tx_id, requester = %requester.id, "execute refused: not authorized");
            return Err(LedgerError::Unauthorized(format!(
                "{} may not execute transaction {}",
                requester.id, tx_id
            )));
        }

        let claim = SettlementClaim::new(&requester.id, Utc::now());
        let claim_id = claim.claim_id.clone();
        let claimed = self
            .ctx
            .update(current, |tx| Ok(Step::Commit(tx.with_claim(claim.clone())?, ())))?
            .record;
        info!(tx_id, requester = %requester.id, "settlement claimed");

        // From here on the claim is ours to finish or release, whether or
        // not the caller is still waiting.
        let run = SettlementRun {
            ctx: self.ctx.clone(),
            claimed,
            claim_id,
            requester_id: requester.id.clone(),
        };
        match tokio::spawn(run.finish()).await {
            Ok(result) => result,
            Err(e) => {
                error!(tx_id, error = %e, "settlement task did not complete");
                Err(LedgerError::SettlementFailure {
                    tx_id: tx_id.to_string(),
                    reason: format!("settlement task failed: {e}"),
                    retryable: true,
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // reject
    // -----------------------------------------------------------------------

    pub async fn reject(
        &self,
        session: &Session,
        tx_id: &str,
        reason: &str,
    ) -> LedgerResult<TransactionView> {
        let requester = match self.ctx.principal(session).await {
            Ok(p) => p,
            Err(e) => {
                self.ctx
                    .audit_error(&session.principal_id, AuditAction::RejectTransaction, tx_id, &e);
                return Err(e);
            }
        };

        let result = self.reject_as(&requester, tx_id, reason);
        if let Err(e) = &result {
            self.ctx
                .audit_error(&requester.id, AuditAction::RejectTransaction, tx_id, e);
        }
        result
    }

    fn reject_as(
        &self,
        requester: &Principal,
        tx_id: &str,
        reason: &str,
    ) -> LedgerResult<TransactionView> {
        let current = self.ctx.load(tx_id)?;
        if !self.ctx.policy.can_reject(requester, &current) {
            warn!(tx_id, requester = %requester.id, "reject refused: not authorized");
            return Err(LedgerError::Unauthorized(format!(
                "{} may not reject transaction {}",
                requester.id, tx_id
            )));
        }

        let now = Utc::now();
        let applied = self.ctx.update(current, |tx| {
            Ok(Step::Commit(tx.with_rejection(&requester.id, reason, now)?, tx.status))
        })?;
        let from = applied.value;
        let view = TransactionView::from(&applied.record);

        info!(tx_id, requester = %requester.id, from = %from, "transaction rejected");
        self.ctx.audit(
            AuditEvent::new(&requester.id, AuditAction::RejectTransaction, tx_id, AuditOutcome::Success)
                .with_detail(reason.trim().to_string()),
        );
        self.ctx.emit(LedgerEvent::TransactionRejected {
            from,
            transaction: view.clone(),
        });
        Ok(view)
    }

    // -----------------------------------------------------------------------
    // recovery
    // -----------------------------------------------------------------------

    /// Release every settlement claim older than `max_age`. Returns how many
    /// were released.
    pub fn release_stale_claims(&self, max_age: Duration) -> LedgerResult<usize> {
        let now = Utc::now();
        let mut released = 0;

        for tx in self.ctx.store.list_by_status(TransactionStatus::Approved)? {
            let Some(claim) = tx.settlement_claim.clone() else {
                continue;
            };
            if !claim.is_stale(now, max_age) {
                continue;
            }

            let tx_id = tx.id.clone();
            let applied = self.ctx.update(tx, |t| {
                if !t.holds_claim(&claim.claim_id) {
                    return Ok(Step::Unchanged(()));
                }
                Ok(Step::Commit(t.with_claim_released(&claim.claim_id)?, ()))
            })?;
            if !applied.committed {
                continue;
            }

            released += 1;
            warn!(
                tx_id = %tx_id,
                claimant = %claim.claimant_id,
                claimed_at = %claim.claimed_at,
                "released stale settlement claim"
            );
            self.ctx.audit(
                AuditEvent::new(SYSTEM_ACTOR, AuditAction::ReleaseClaim, &tx_id, AuditOutcome::Success)
                    .with_detail(format!("claim by {} at {}", claim.claimant_id, claim.claimed_at)),
            );
            self.ctx.emit(LedgerEvent::ClaimReleased { tx_id });
        }

        Ok(released)
    }
}

/// The settle-and-commit half of an execution. Runs on its own task so it
/// always ends with the claim either committed as `executed` or released.
struct SettlementRun {
    ctx: LedgerContext,
    claimed: Transaction,
    claim_id: String,
    requester_id: String,
}

impl SettlementRun {
    async fn finish(self) -> LedgerResult<ExecutionResult> {
        let tx_id = self.claimed.id.clone();
        let instruction = SettlementInstruction::for_transaction(&self.claimed, &self.requester_id);
        let budget = self.ctx.config.settlement_timeout();
        let started = Instant::now();
        let settled = timeout(budget, self.ctx.settlement.settle(&instruction)).await;
        let latency = started.elapsed();

        let receipt = match settled {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                let retryable = e.is_retryable();
                return Err(self.abandon(e.to_string(), retryable, latency));
            }
            Err(_) => {
                let reason = format!("settlement timed out after {}ms", budget.as_millis());
                return Err(self.abandon(reason, true, latency));
            }
        };

        let executed_at = Utc::now();
        let claim_id = self.claim_id.as_str();
        let committed = self.ctx.update(self.claimed.clone(), |tx| {
            Ok(Step::Commit(
                tx.with_settlement(claim_id, receipt.clone(), executed_at)?,
                (),
            ))
        });
        let tx = match committed {
            Ok(applied) => applied.record,
            Err(e) => {
                // Money moved but the record didn't. Hand the record back so
                // a retry re-settles under the same idempotency key and
                // gets this receipt replayed.
                error!(
                    tx_id = %tx_id,
                    reference = %receipt.reference,
                    error = %e,
                    "settlement applied but commit failed"
                );
                self.release();
                self.ctx.emit(LedgerEvent::SettlementFailed {
                    tx_id: tx_id.clone(),
                    reason: e.to_string(),
                });
                return Err(LedgerError::SettlementFailure {
                    reason: format!("settled as {} but not recorded: {e}", receipt.reference),
                    tx_id,
                    retryable: true,
                });
            }
        };

        let view = TransactionView::from(&tx);
        let latency_ms = latency.as_millis() as u64;
        info!(
            tx_id = %tx_id,
            requester = %self.requester_id,
            reference = %receipt.reference,
            latency_ms,
            "transaction executed"
        );
        self.ctx.audit(
            AuditEvent::new(
                &self.requester_id,
                AuditAction::ExecuteTransaction,
                &tx_id,
                AuditOutcome::Success,
            )
            .with_detail(receipt.reference.clone()),
        );
        self.ctx.emit(LedgerEvent::TransactionExecuted {
            transaction: view.clone(),
            settlement_latency_ms: latency_ms,
        });

        Ok(ExecutionResult {
            transaction: view,
            receipt,
            settlement_latency_ms: latency_ms,
        })
    }

    /// Settlement didn't confirm: hand the record back in `approved` and
    /// build the error.
    fn abandon(&self, reason: String, retryable: bool, latency: Duration) -> LedgerError {
        let tx_id = self.claimed.id.clone();
        warn!(
            tx_id = %tx_id,
            reason = %reason,
            retryable,
            latency_ms = latency.as_millis() as u64,
            "settlement failed, releasing claim"
        );

        self.release();
        self.ctx.emit(LedgerEvent::SettlementFailed {
            tx_id: tx_id.clone(),
            reason: reason.clone(),
        });
        LedgerError::SettlementFailure {
            tx_id,
            reason,
            retryable,
        }
    }

    /// Drop our claim if it is still on the record.
    fn release(&self) {
        let released = self.ctx.update(self.claimed.clone(), |tx| {
            if !tx.holds_claim(&self.claim_id) {
                return Ok(Step::Unchanged(()));
            }
            Ok(Step::Commit(tx.with_claim_released(&self.claim_id)?, ()))
        });
        if let Err(e) = released {
            error!(
                tx_id = %self.claimed.id,
                error = %e,
                "could not release settlement claim; the claim sweep will"
            );
        }
    }
}
