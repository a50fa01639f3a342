// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Settlement Boundary
//!
//! Settlement is the external effect: money actually moves. The ledger
//! reaches it through [`SettlementBoundary`] and nothing else.
//!
//! ## Exactly once
//!
//! The execution gate guarantees at most one in-flight settlement call per
//! transaction (it holds a [`SettlementClaim`] while calling). What it can't
//! guarantee on its own is that a call which *timed out* didn't land on the
//! other side. So every [`SettlementInstruction`] carries an idempotency key
//! (the transaction id), and a boundary that has already applied that key
//! must return the original receipt instead of moving money twice.
//! [`InMemorySettlement`] does exactly that.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::transaction::{Amount, Transaction};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the boundary is asked to do. Immutable fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub tx_id: String,
    pub idempotency_key: String,
    pub amount: Amount,
    pub recipient: String,
    pub description: String,
    /// Principal whose execute call triggered this.
    pub requested_by: String,
}

impl SettlementInstruction {
    pub fn for_transaction(tx: &Transaction, requested_by: &str) -> Self {
        Self {
            tx_id: tx.id.clone(),
            idempotency_key: tx.id.clone(),
            amount: tx.amount.clone(),
            recipient: tx.recipient.clone(),
            description: tx.description.clone(),
            requested_by: requested_by.to_string(),
        }
    }
}

/// Proof the boundary applied the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// The boundary's own reference for the transfer.
    pub reference: String,
    pub idempotency_key: String,
    pub settled_at: DateTime<Utc>,
}

/// Marker held on a record while one execute call talks to settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementClaim {
    /// Unique per execute call, so a caller only ever commits or releases
    /// its own claim.
    pub claim_id: String,
    pub claimant_id: String,
    pub claimed_at: DateTime<Utc>,
}

impl SettlementClaim {
    pub fn new(claimant_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            claim_id: Uuid::new_v4().to_string(),
            claimant_id: claimant_id.to_string(),
            claimed_at: now,
        }
    }

    /// Whether the claim is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now - self.claimed_at >= max_age,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettlementError {
    /// The far side couldn't be reached or didn't answer.
    #[error("settlement unavailable: {0}")]
    Unavailable(String),

    /// The far side refused the transfer.
    #[error("settlement declined: {0}")]
    Declined(String),
}

impl SettlementError {
    /// A refusal is an answer; asking again gets the same one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::Unavailable(_))
    }
}

/// The external funds-movement capability.
#[async_trait]
pub trait SettlementBoundary: Send + Sync {
    async fn settle(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<SettlementReceipt, SettlementError>;
}

// ---------------------------------------------------------------------------
// InMemorySettlement
// ---------------------------------------------------------------------------

/// Idempotent in-process settlement. Good for development and for tests
/// that need to count transfers, inject failures or stall a call.
#[derive(Debug, Default)]
pub struct InMemorySettlement {
    applied: DashMap<String, SettlementReceipt>,
    calls: AtomicU64,
    fail_next: AtomicU32,
    decline_next: AtomicU32,
    delay: Mutex<Option<Duration>>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` calls fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// The next `n` calls are refused with `Declined`.
    pub fn decline_next(&self, n: u32) {
        self.decline_next.store(n, Ordering::SeqCst);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of distinct transfers applied.
    pub fn settled_count(&self) -> usize {
        self.applied.len()
    }

    /// Number of times `settle` was called, including failures and replays.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn receipt_for(&self, idempotency_key: &str) -> Option<SettlementReceipt> {
        self.applied.get(idempotency_key).map(|r| r.value().clone())
    }
}

#[async_trait]
impl SettlementBoundary for InMemorySettlement {
    async fn settle(
        &self,
        instruction: &SettlementInstruction,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if take_one(&self.fail_next) {
            return Err(SettlementError::Unavailable("injected failure".into()));
        }
        if take_one(&self.decline_next) {
            return Err(SettlementError::Declined("injected refusal".into()));
        }

        let receipt = self
            .applied
            .entry(instruction.idempotency_key.clone())
            .or_insert_with(|| SettlementReceipt {
                reference: format!("stl-{}", Uuid::new_v4().simple()),
                idempotency_key: instruction.idempotency_key.clone(),
                settled_at: Utc::now(),
            })
            .value()
            .clone();
        Ok(receipt)
    }
}

/// Decrement a countdown, reporting whether there was one left to take.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
