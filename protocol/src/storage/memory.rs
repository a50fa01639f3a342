// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! In-memory transaction store.
//!
//! `DashMap` shards its locks, so a compare-and-swap only holds the shard
//! containing the record, and only for the version compare and the write.
//! Nothing async ever happens under it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{
    ensure_same_record, sort_by_creation, CasOutcome, StoreError, StoreResult, TransactionStore,
};
use crate::transaction::Transaction;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Transaction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for MemoryStore {
    fn insert(&self, tx: &Transaction) -> StoreResult<()> {
        match self.records.entry(tx.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(tx.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(tx.clone());
                Ok(())
            }
        }
    }

    fn get(&self, id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    fn compare_and_swap(
        &self,
        expected: &Transaction,
        next: &Transaction,
    ) -> StoreResult<CasOutcome> {
        ensure_same_record(expected, next)?;
        let Some(mut current) = self.records.get_mut(&expected.id) else {
            return Ok(CasOutcome::Conflict(None));
        };
        if current.version != expected.version {
            return Ok(CasOutcome::Conflict(Some(Box::new(current.clone()))));
        }
        *current = next.clone();
        Ok(CasOutcome::Committed)
    }

    fn list(&self) -> StoreResult<Vec<Transaction>> {
        let mut all: Vec<Transaction> = self.records.iter().map(|r| r.value().clone()).collect();
        sort_by_creation(&mut all);
        Ok(all)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.records.len())
    }
}
