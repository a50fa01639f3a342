// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Storage Module
//!
//! Per-record atomically updatable storage for transactions.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs     - TransactionStore trait, StoreError, CasOutcome
//! memory.rs  - MemoryStore: DashMap, shard lock held only for compare+write
//! db.rs      - SledStore: sled tree, Tree::compare_and_swap per key
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Optimistic, per record.** The only write primitive after insert is
//!    [`TransactionStore::compare_and_swap`]: commit `next` iff the stored
//!    record is still `expected`. Two ids never contend; there is no lock
//!    that spans records.
//!
//! 2. **Conflicts hand back the winner.** A failed swap returns the record
//!    that beat us, so the caller can re-derive without a second read.
//!
//! 3. **Bincode on disk.** JSON is for the API; bincode is for storage.
//!    Nothing stored uses `skip_serializing_if` or internally tagged enums,
//!    which bincode can't round-trip.

pub mod db;
pub mod memory;

pub use db::SledStore;
pub use memory::MemoryStore;

use thiserror::Error;

use crate::transaction::{Transaction, TransactionStatus};

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction already exists: {0}")]
    AlreadyExists(String),

    #[error("compare-and-swap on {expected_id} with a record for {next_id}")]
    IdMismatch { expected_id: String, next_id: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// `next` is now the stored record.
    Committed,
    /// Somebody else got there first. Carries the current record, or `None`
    /// if it has vanished.
    Conflict(Option<Box<Transaction>>),
}

/// Durable transaction storage with per-record compare-and-swap.
pub trait TransactionStore: Send + Sync {
    /// Store a brand-new record. Fails if the id is taken.
    fn insert(&self, tx: &Transaction) -> StoreResult<()>;

    fn get(&self, id: &str) -> StoreResult<Option<Transaction>>;

    /// Replace `expected` with `next` iff the stored record is still
    /// `expected` (same version).
    fn compare_and_swap(&self, expected: &Transaction, next: &Transaction)
        -> StoreResult<CasOutcome>;

    /// All records, oldest first.
    fn list(&self) -> StoreResult<Vec<Transaction>>;

    /// Records in `status`, oldest first.
    fn list_by_status(&self, status: TransactionStatus) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|tx| tx.status == status)
            .collect())
    }

    fn len(&self) -> StoreResult<usize>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn ensure_same_record(expected: &Transaction, next: &Transaction) -> StoreResult<()> {
    if expected.id != next.id {
        return Err(StoreError::IdMismatch {
            expected_id: expected.id.clone(),
            next_id: next.id.clone(),
        });
    }
    Ok(())
}

/// Oldest first, id as the tie-breaker so the order is total.
pub(crate) fn sort_by_creation(records: &mut [Transaction]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
