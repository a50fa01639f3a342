// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quorum Ledger
//!
//! The one type callers talk to. [`QuorumLedger`] wires the collaborators
//! together, exposes the command surface (create, sign, execute, reject)
//! and the read projections, and publishes a [`LedgerEvent`] after every
//! committed change.
//!
//! ```text
//!   create ──▶ store
//!   sign   ──▶ SignatureCoordinator ──▶ policy, directory, verifier, store
//!   execute──▶ ExecutionGate        ──▶ policy, store, settlement
//!   reject ──▶ ExecutionGate        ──▶ policy, store
//!                         │
//!                         └──▶ audit sink, event channel
//! ```
//!
//! Every operation takes the caller's [`Session`] explicitly and returns
//! the post-mutation view, so clients never have to re-fetch to learn
//! what their call did.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, MemoryAuditLog};
use crate::config::{ConfigError, LedgerConfig, EVENT_CHANNEL_CAPACITY};
use crate::context::LedgerContext;
use crate::coordinator::{SignatureCoordinator, SignatureReceipt};
use crate::crypto::{CryptoVerifier, Ed25519Verifier};
use crate::error::{LedgerError, LedgerResult};
use crate::gate::{ExecutionGate, ExecutionResult, SYSTEM_ACTOR};
use crate::identity::{IdentityDirectory, InMemoryDirectory, Principal, Role, Session};
use crate::policy::AuthorizationPolicy;
use crate::settlement::{InMemorySettlement, SettlementBoundary};
use crate::storage::{MemoryStore, TransactionStore};
use crate::transaction::{NewTransaction, Transaction, TransactionStatus, TransactionView};

// ---------------------------------------------------------------------------
// Events & stats
// ---------------------------------------------------------------------------

/// Change notification published after each committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionCreated {
        transaction: TransactionView,
    },
    SignatureAccepted {
        signer_id: String,
        transaction: TransactionView,
    },
    TransactionApproved {
        transaction: TransactionView,
    },
    TransactionExecuted {
        transaction: TransactionView,
        settlement_latency_ms: u64,
    },
    /// Settlement didn't confirm; the record is still `approved`.
    SettlementFailed {
        tx_id: String,
        reason: String,
    },
    TransactionRejected {
        /// Status the record left.
        from: TransactionStatus,
        transaction: TransactionView,
    },
    /// Recovery released an abandoned settlement claim.
    ClaimReleased {
        tx_id: String,
    },
}

impl LedgerEvent {
    pub fn tx_id(&self) -> &str {
        match self {
            Self::TransactionCreated { transaction }
            | Self::SignatureAccepted { transaction, .. }
            | Self::TransactionApproved { transaction }
            | Self::TransactionExecuted { transaction, .. }
            | Self::TransactionRejected { transaction, .. } => &transaction.id,
            Self::SettlementFailed { tx_id, .. } | Self::ClaimReleased { tx_id } => tx_id,
        }
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub executed: usize,
    pub rejected: usize,
    /// Approved records with a settlement call in flight.
    pub settling: usize,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// How a registration got past the front door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Bootstrap: only valid while no admin exists.
    FirstAdmin,
    ByAdmin,
}

/// Assembles a [`QuorumLedger`]. Anything not supplied gets the in-process
/// implementation.
pub struct LedgerBuilder {
    config: LedgerConfig,
    store: Option<Arc<dyn TransactionStore>>,
    directory: Option<Arc<dyn IdentityDirectory>>,
    verifier: Option<Arc<dyn CryptoVerifier>>,
    settlement: Option<Arc<dyn SettlementBoundary>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl LedgerBuilder {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            store: None,
            directory: None,
            verifier: None,
            settlement: None,
            audit: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn TransactionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn IdentityDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn CryptoVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn settlement(mut self, settlement: Arc<dyn SettlementBoundary>) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Result<QuorumLedger, ConfigError> {
        self.config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let ctx = LedgerContext {
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            directory: self
                .directory
                .unwrap_or_else(|| Arc::new(InMemoryDirectory::new())),
            verifier: self.verifier.unwrap_or_else(|| Arc::new(Ed25519Verifier)),
            settlement: self
                .settlement
                .unwrap_or_else(|| Arc::new(InMemorySettlement::new())),
            audit: self.audit.unwrap_or_else(|| Arc::new(MemoryAuditLog::new())),
            policy: Arc::new(self.config.policy()),
            config: Arc::new(self.config),
            events,
        };
        Ok(QuorumLedger {
            coordinator: SignatureCoordinator::new(ctx.clone()),
            gate: ExecutionGate::new(ctx.clone()),
            registration: Mutex::new(()),
            ctx,
        })
    }
}

// ---------------------------------------------------------------------------
// QuorumLedger
// ---------------------------------------------------------------------------

pub struct QuorumLedger {
    ctx: LedgerContext,
    coordinator: SignatureCoordinator,
    gate: ExecutionGate,
    /// Serializes principal registration so the pool-size check and the
    /// insert can't interleave. Never held by transaction operations.
    registration: Mutex<()>,
}

impl QuorumLedger {
    pub fn builder(config: LedgerConfig) -> LedgerBuilder {
        LedgerBuilder::new(config)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.ctx.config
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.ctx.policy
    }

    /// A fresh receiver of [`LedgerEvent`]s from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.ctx.events.subscribe()
    }

    // -- commands ------------------------------------------------------------

    /// Propose a transfer. The caller becomes its initiator.
    pub async fn create_transaction(
        &self,
        session: &Session,
        request: NewTransaction,
    ) -> LedgerResult<TransactionView> {
        let result = self.create_as(session, request).await;
        match &result {
            Ok(view) => {
                self.ctx.audit(
                    AuditEvent::new(
                        &view.initiator_id,
                        AuditAction::CreateTransaction,
                        &view.id,
                        AuditOutcome::Success,
                    )
                    .with_detail(view.amount_display.clone()),
                );
                self.ctx.emit(LedgerEvent::TransactionCreated {
                    transaction: view.clone(),
                });
            }
            Err(e) => self.ctx.audit_error(
                &session.principal_id,
                AuditAction::CreateTransaction,
                "-",
                e,
            ),
        }
        result
    }

    async fn create_as(
        &self,
        session: &Session,
        request: NewTransaction,
    ) -> LedgerResult<TransactionView> {
        let initiator = self.ctx.principal(session).await?;
        if !self.ctx.policy.can_create(&initiator) {
            warn!(principal = %initiator.id, role = %initiator.role, "create refused: not authorized");
            return Err(LedgerError::Unauthorized(format!(
                "{} may not create transactions",
                initiator.id
            )));
        }

        let tx = Transaction::create(
            request,
            &initiator.id,
            self.ctx.policy.required_signatures(),
            Utc::now(),
        )?;
        self.ctx.store.insert(&tx)?;

        info!(
            tx_id = %tx.id,
            initiator = %initiator.id,
            amount = %tx.amount,
            required = tx.required_signatures,
            "transaction created"
        );
        Ok(TransactionView::from(&tx))
    }

    /// Submit an approver's signature over the transaction digest.
    pub async fn sign_transaction(
        &self,
        session: &Session,
        tx_id: &str,
        signature: &[u8],
    ) -> LedgerResult<SignatureReceipt> {
        self.coordinator
            .submit_signature(session, tx_id, signature)
            .await
    }

    /// Settle an approved transaction, exactly once.
    pub async fn execute_transaction(
        &self,
        session: &Session,
        tx_id: &str,
    ) -> LedgerResult<ExecutionResult> {
        self.gate.execute(session, tx_id).await
    }

    /// Terminate a pending or approved transaction.
    pub async fn reject_transaction(
        &self,
        session: &Session,
        tx_id: &str,
        reason: &str,
    ) -> LedgerResult<TransactionView> {
        self.gate.reject(session, tx_id, reason).await
    }

    /// Free settlement claims abandoned for longer than `max_age`.
    pub fn release_stale_claims(&self, max_age: Duration) -> LedgerResult<usize> {
        let released = self.gate.release_stale_claims(max_age)?;
        if released > 0 {
            info!(released, "stale settlement claims released");
        }
        Ok(released)
    }

    // -- principals ----------------------------------------------------------

    /// Register a principal. Only admins may register others.
    pub async fn register_principal(
        &self,
        session: &Session,
        principal: Principal,
    ) -> LedgerResult<Principal> {
        let registrar = self.ctx.principal(session).await;
        let result = match registrar {
            Ok(r) if r.role == Role::Admin => {
                self.register(principal.clone(), Admission::ByAdmin).await
            }
            Ok(r) => Err(LedgerError::Unauthorized(format!(
                "{} may not register principals",
                r.id
            ))),
            Err(e) => Err(e),
        };
        self.audit_registration(&session.principal_id, &principal.id, &result);
        result
    }

    /// Register the first admin, without a session. Refused once any admin
    /// exists.
    pub async fn bootstrap_admin(&self, principal: Principal) -> LedgerResult<Principal> {
        let result = if principal.role != Role::Admin {
            Err(LedgerError::Validation("bootstrap principal must be an admin".into()))
        } else {
            self.register(principal.clone(), Admission::FirstAdmin).await
        };
        self.audit_registration(SYSTEM_ACTOR, &principal.id, &result);
        result
    }

    async fn register(&self, principal: Principal, admission: Admission) -> LedgerResult<Principal> {
        // Every directory check below must see the same roster the write lands on.
        let _guard = self.registration.lock().await;

        if admission == Admission::FirstAdmin
            && self
                .ctx
                .directory
                .list()
                .await
                .iter()
                .any(|p| p.role == Role::Admin)
        {
            return Err(LedgerError::Validation("an admin already exists".into()));
        }

        if self.ctx.policy.can_sign(&principal) {
            let pool = self.ctx.policy.approver_pool_size() as usize;
            let signers = self
                .ctx
                .directory
                .list()
                .await
                .iter()
                .filter(|p| self.ctx.policy.can_sign(p))
                .count();
            if signers >= pool {
                return Err(LedgerError::Validation(format!(
                    "approver pool is full ({pool} signing principals)"
                )));
            }
        }

        self.ctx.directory.register(principal.clone()).await?;
        info!(principal = %principal.id, role = %principal.role, "principal registered");
        Ok(principal)
    }

    fn audit_registration(&self, actor: &str, target: &str, result: &LedgerResult<Principal>) {
        match result {
            Ok(p) => self.ctx.audit(
                AuditEvent::new(actor, AuditAction::RegisterPrincipal, target, AuditOutcome::Success)
                    .with_detail(p.role.to_string()),
            ),
            Err(e) => self
                .ctx
                .audit_error(actor, AuditAction::RegisterPrincipal, target, e),
        }
    }

    pub async fn principal(&self, principal_id: &str) -> LedgerResult<Principal> {
        Ok(self.ctx.directory.resolve(principal_id).await?)
    }

    pub async fn principals(&self) -> Vec<Principal> {
        self.ctx.directory.list().await
    }

    // -- reads ---------------------------------------------------------------

    pub fn get_transaction(&self, tx_id: &str) -> LedgerResult<TransactionView> {
        Ok(TransactionView::from(&self.ctx.load(tx_id)?))
    }

    /// Hex digest an external signer signs for this transaction.
    pub fn transaction_digest(&self, tx_id: &str) -> LedgerResult<String> {
        Ok(self.ctx.load(tx_id)?.digest_hex())
    }

    pub fn list_by_status(&self, status: TransactionStatus) -> LedgerResult<Vec<TransactionView>> {
        Ok(self
            .ctx
            .store
            .list_by_status(status)?
            .iter()
            .map(TransactionView::from)
            .collect())
    }

    pub fn list_pending(&self) -> LedgerResult<Vec<TransactionView>> {
        self.list_by_status(TransactionStatus::Pending)
    }

    pub fn list_approved(&self) -> LedgerResult<Vec<TransactionView>> {
        self.list_by_status(TransactionStatus::Approved)
    }

    /// Pending transactions the session's principal could sign and hasn't.
    pub async fn list_awaiting_signature(
        &self,
        session: &Session,
    ) -> LedgerResult<Vec<TransactionView>> {
        let principal = self.ctx.principal(session).await?;
        Ok(self
            .ctx
            .store
            .list_by_status(TransactionStatus::Pending)?
            .iter()
            .filter(|tx| {
                !tx.has_signed(&principal.id)
                    && self.ctx.policy.can_sign_transaction(&principal, tx)
            })
            .map(TransactionView::from)
            .collect())
    }

    pub fn stats(&self) -> LedgerResult<LedgerStats> {
        let mut stats = LedgerStats::default();
        for tx in self.ctx.store.list()? {
            stats.total += 1;
            match tx.status {
                TransactionStatus::Pending => stats.pending += 1,
                TransactionStatus::Approved => {
                    stats.approved += 1;
                    if tx.settlement_in_progress() {
                        stats.settling += 1;
                    }
                }
                TransactionStatus::Executed => stats.executed += 1,
                TransactionStatus::Rejected => stats.rejected += 1,
            }
        }
        Ok(stats)
    }
}
