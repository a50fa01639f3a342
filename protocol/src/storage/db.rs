// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SledStore: Persistent Transaction Storage
//!
//! Transactions live in sled's embedded key-value store, one named tree:
//!
//! | Tree           | Key                  | Value                  |
//! |----------------|----------------------|------------------------|
//! | `transactions` | `tx_id` (UTF-8)      | `bincode(Transaction)` |
//!
//! ## Atomicity
//!
//! Every write is a `Tree::compare_and_swap` on the record's own key.
//! Insert swaps `None` for the new bytes; updates swap the exact bytes we
//! read for the next record's bytes. sled guarantees the swap is atomic
//! for that key, which is all the per-record isolation the ledger needs.
//! Every committed write is flushed before we report success.

use sled::{Db, IVec, Tree};
use std::path::Path;

use super::{
    ensure_same_record, sort_by_creation, CasOutcome, StoreError, StoreResult, TransactionStore,
};
use crate::transaction::Transaction;

const TRANSACTIONS_TREE: &str = "transactions";

/// Durable store backed by sled.
///
/// sled is thread-safe on its own; share it as `Arc<SledStore>` without
/// any extra locking.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    transactions: Tree,
}

impl SledStore {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway database, removed when dropped. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let transactions = db.open_tree(TRANSACTIONS_TREE)?;
        Ok(Self { db, transactions })
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode(tx: &Transaction) -> StoreResult<Vec<u8>> {
    bincode::serialize(tx).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> StoreResult<Transaction> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl TransactionStore for SledStore {
    fn insert(&self, tx: &Transaction) -> StoreResult<()> {
        let bytes = encode(tx)?;
        match self
            .transactions
            .compare_and_swap(tx.id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                self.flush()?;
                Ok(())
            }
            Err(_) => Err(StoreError::AlreadyExists(tx.id.clone())),
        }
    }

    fn get(&self, id: &str) -> StoreResult<Option<Transaction>> {
        self.transactions
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn compare_and_swap(
        &self,
        expected: &Transaction,
        next: &Transaction,
    ) -> StoreResult<CasOutcome> {
        ensure_same_record(expected, next)?;
        let key = expected.id.as_bytes();

        let Some(current_bytes) = self.transactions.get(key)? else {
            return Ok(CasOutcome::Conflict(None));
        };
        let current = decode(&current_bytes)?;
        if current.version != expected.version {
            return Ok(CasOutcome::Conflict(Some(Box::new(current))));
        }

        // Swap against the raw bytes we just read, not a re-encoding of
        // `expected`, so the comparison is exact.
        let swapped =
            self.transactions
                .compare_and_swap(key, Some(&current_bytes), Some(encode(next)?))?;
        match swapped {
            Ok(()) => {
                self.flush()?;
                Ok(CasOutcome::Committed)
            }
            Err(conflict) => {
                let winner = conflict
                    .current
                    .map(|bytes: IVec| decode(&bytes))
                    .transpose()?;
                Ok(CasOutcome::Conflict(winner.map(Box::new)))
            }
        }
    }

    fn list(&self) -> StoreResult<Vec<Transaction>> {
        let mut all = Vec::with_capacity(self.transactions.len());
        for item in self.transactions.iter() {
            let (_, bytes) = item?;
            all.push(decode(&bytes)?);
        }
        sort_by_creation(&mut all);
        Ok(all)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.transactions.len())
    }
}
