// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Signature Coordinator
//!
//! Owns signature submission: authorization, dedup, verification, the
//! append, and the `pending -> approved` flip when the quorum is reached.
//!
//! ## Design
//!
//! Steps, per call:
//!
//! 1. Resolve the signer; refuse unless the policy lets them sign this
//!    transaction.
//! 2. Already signed? Return the current view. Not an error.
//! 3. Verify the blob against the canonical digest, outside any lock and
//!    under `verify_timeout`.
//! 4. Append and, if the count reaches `required_signatures`, approve. One
//!    compare-and-swap commits both, so two signers crossing the threshold
//!    at the same moment produce exactly one transition: the loser re-reads,
//!    finds the record `approved`, and is refused.
//!
//! Steps 1–3 never write. The digest only covers immutable fields, so a
//! verification result stays valid across swap retries.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEvent, AuditOutcome};
use crate::context::{LedgerContext, Step};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{Principal, Session};
use crate::ledger::LedgerEvent;
use crate::transaction::{SignatureRecord, Transaction, TransactionView};

/// What a submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignatureOutcome {
    /// The signature was recorded.
    Accepted {
        /// This signature completed the quorum.
        approved_now: bool,
    },
    /// The signer had already signed; nothing changed.
    AlreadySigned,
}

/// Post-call state handed back to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureReceipt {
    #[serde(flatten)]
    pub outcome: SignatureOutcome,
    pub transaction: TransactionView,
}

pub struct SignatureCoordinator {
    ctx: LedgerContext,
}

impl SignatureCoordinator {
    pub(crate) fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Submit `signature` (raw bytes over [`Transaction::digest`]) on behalf
    /// of the session's principal.
    pub async fn submit_signature(
        &self,
        session: &Session,
        tx_id: &str,
        signature: &[u8],
    ) -> LedgerResult<SignatureReceipt> {
        let signer = match self.ctx.principal(session).await {
            Ok(p) => p,
            Err(e) => {
                self.ctx
                    .audit_error(&session.principal_id, AuditAction::SubmitSignature, tx_id, &e);
                return Err(e);
            }
        };

        let result = self.submit_as(&signer, tx_id, signature).await;
        if let Err(e) = &result {
            self.ctx
                .audit_error(&signer.id, AuditAction::SubmitSignature, tx_id, e);
        }
        result
    }

    async fn submit_as(
        &self,
        signer: &Principal,
        tx_id: &str,
        signature: &[u8],
    ) -> LedgerResult<SignatureReceipt> {
        let current = self.ctx.load(tx_id)?;

        if !self.ctx.policy.can_sign_transaction(signer, &current) {
            warn!(tx_id, signer = %signer.id, role = %signer.role, "signature refused: not authorized");
            return Err(LedgerError::Unauthorized(format!(
                "{} may not sign transaction {}",
                signer.id, tx_id
            )));
        }

        if current.has_signed(&signer.id) {
            debug!(tx_id, signer = %signer.id, "duplicate signature ignored");
            return Ok(already_signed(&current));
        }

        current.ensure_signable()?;
        self.verify(signer, &current, signature).await?;

        let record = SignatureRecord {
            signer_id: signer.id.clone(),
            signature: signature.to_vec(),
            signed_at: Utc::now(),
        };
        let applied = self.ctx.update(current, |tx| {
            // A concurrent resubmission by the same signer may have won.
            if tx.has_signed(&record.signer_id) {
                return Ok(Step::Unchanged(false));
            }
            let (next, approved_now) = tx.with_signature(record.clone())?;
            Ok(Step::Commit(next, approved_now))
        })?;

        if !applied.committed {
            debug!(tx_id, signer = %signer.id, "duplicate signature ignored");
            return Ok(already_signed(&applied.record));
        }

        let tx = applied.record;
        let approved_now = applied.value;
        let view = TransactionView::from(&tx);

        info!(
            tx_id,
            signer = %signer.id,
            count = tx.signature_count(),
            required = tx.required_signatures,
            "signature accepted"
        );
        self.ctx.audit(AuditEvent::new(
            &signer.id,
            AuditAction::SubmitSignature,
            tx_id,
            AuditOutcome::Success,
        ));
        self.ctx.emit(LedgerEvent::SignatureAccepted {
            signer_id: signer.id.clone(),
            transaction: view.clone(),
        });

        if approved_now {
            info!(tx_id, signatures = tx.signature_count(), "quorum reached, transaction approved");
            self.ctx.audit(
                AuditEvent::new(&signer.id, AuditAction::ApproveTransaction, tx_id, AuditOutcome::Success)
                    .with_detail(format!("{} of {}", tx.signature_count(), tx.required_signatures)),
            );
            self.ctx.emit(LedgerEvent::TransactionApproved {
                transaction: view.clone(),
            });
        }

        Ok(SignatureReceipt {
            outcome: SignatureOutcome::Accepted { approved_now },
            transaction: view,
        })
    }

    async fn verify(
        &self,
        signer: &Principal,
        tx: &Transaction,
        signature: &[u8],
    ) -> LedgerResult<()> {
        let digest = tx.digest();
        let budget = self.ctx.config.verify_timeout();
        let verified = timeout(
            budget,
            self.ctx.verifier.verify(&digest, signature, &signer.public_key),
        )
        .await
        .map_err(|_| {
            warn!(tx_id = %tx.id, signer = %signer.id, "signature verification timed out");
            LedgerError::Timeout {
                operation: "signature verification",
                after_ms: budget.as_millis() as u64,
            }
        })?;

        if !verified {
            warn!(tx_id = %tx.id, signer = %signer.id, "invalid signature");
            return Err(LedgerError::InvalidSignature {
                signer: signer.id.clone(),
            });
        }
        Ok(())
    }
}

fn already_signed(tx: &Transaction) -> SignatureReceipt {
    SignatureReceipt {
        outcome: SignatureOutcome::AlreadySigned,
        transaction: TransactionView::from(tx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_json_is_flat() {
        let receipt_json = serde_json::to_value(SignatureOutcome::Accepted { approved_now: true }).unwrap();
        assert_eq!(receipt_json["outcome"], "accepted");
        assert_eq!(receipt_json["approved_now"], true);

        let dup = serde_json::to_value(SignatureOutcome::AlreadySigned).unwrap();
        assert_eq!(dup["outcome"], "already_signed");
    }
}
