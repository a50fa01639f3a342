// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quorum Protocol: Core Library
//!
//! The engine behind high-value transfers that must not move a single cent
//! until a quorum of independent approvers has signed them. k-of-n approval,
//! exactly-once execution, and an audit trail for every attempt, successful
//! or not.
//!
//! ## Architecture
//!
//! The crate is split along the seams of the approval flow:
//!
//! - **crypto**: Ed25519 keys, signature verification, digests.
//! - **identity**: Principals, roles, the directory and session contexts.
//! - **transaction**: The transaction record, its canonical digest and views.
//! - **policy**: Who may create, sign, execute and reject. Data, not code.
//! - **storage**: Per-record compare-and-set stores (memory and sled).
//! - **coordinator**: Signature intake and the pending → approved flip.
//! - **gate**: Settlement claims and the approved → executed flip.
//! - **settlement**: The boundary to whatever actually moves the money.
//! - **audit**: Append-only, hash-chained record of every attempt.
//! - **ledger**: The façade callers talk to.
//! - **config**: Defaults, limits and timeouts.
//!
//! ## Ground Rules
//!
//! 1. One transaction is the unit of isolation. No lock ever spans two.
//! 2. Every mutating path commits fully or not at all.
//! 3. Status only moves forward. Terminal states are final.
//! 4. If it touches money, it has tests. Plural.

pub mod audit;
pub mod config;
mod context;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod gate;
pub mod identity;
pub mod ledger;
pub mod policy;
pub mod settlement;
pub mod storage;
pub mod transaction;

pub use audit::{AuditAction, AuditEntry, AuditEvent, AuditOutcome, AuditSink, MemoryAuditLog};
pub use config::LedgerConfig;
pub use coordinator::{SignatureOutcome, SignatureReceipt};
pub use error::{LedgerError, LedgerResult};
pub use gate::ExecutionResult;
pub use identity::{Principal, Role, Session, SessionRegistry};
pub use ledger::{LedgerBuilder, LedgerEvent, LedgerStats, QuorumLedger};
pub use settlement::{InMemorySettlement, SettlementBoundary, SettlementReceipt};
pub use transaction::{Amount, Currency, NewTransaction, TransactionStatus, TransactionView};
