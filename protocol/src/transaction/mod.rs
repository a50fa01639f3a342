// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Transaction Module
//!
//! The multi-signature transaction record, its lifecycle and the read-only
//! view the outside world sees.
//!
//! ## Architecture
//!
//! ```text
//! types.rs   - TransactionStatus, Amount, Currency
//! record.rs  - Transaction, canonical digest, state transitions, TransactionView
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Create**: an initiator submits a [`NewTransaction`]; it becomes a
//!    `pending` [`Transaction`] with zero signatures.
//! 2. **Sign**: approvers sign [`Transaction::digest`]. The append that
//!    reaches `required_signatures` flips the record to `approved`.
//! 3. **Execute**: an authorized caller claims the record, settlement runs,
//!    and only then is `executed` committed.
//! 4. **Reject**: `pending` or `approved` may instead end in `rejected`.
//!
//! ## Design Decisions
//!
//! - Transitions are pure functions from one record to the next, so the
//!   concurrency story lives entirely in the store's compare-and-set.
//! - All amounts are `u64` minor units. No floating point.

pub mod record;
pub mod types;

pub use record::{NewTransaction, SignatureRecord, Transaction, TransactionView};
pub use types::{Amount, Currency, TransactionStatus};
