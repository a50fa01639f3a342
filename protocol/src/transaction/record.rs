// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! The transaction record and its canonical digest.
//!
//! A [`Transaction`] is never mutated in place by the engine. Every
//! lifecycle step is a `with_*` method that checks the current state and
//! returns the *next* record with `version` bumped by one. The store then
//! commits it with a compare-and-set against the record it was derived
//! from. Losing the race means re-reading and deriving again.
//!
//! ## Canonical Digest
//!
//! Approvers sign [`Transaction::digest`], a SHA-256 over a domain tag and
//! the length-prefixed immutable fields: id, amount, currency, recipient,
//! description. Status, signatures and timestamps are excluded, so the
//! digest is stable for the record's whole life and a verification result
//! never goes stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Amount, TransactionStatus};
use crate::config::{
    DIGEST_DOMAIN_TAG, MAX_DESCRIPTION_LENGTH, MAX_REASON_LENGTH, MAX_RECIPIENT_LENGTH,
};
use crate::crypto::sha256_array;
use crate::error::{LedgerError, LedgerResult};
use crate::settlement::{SettlementClaim, SettlementReceipt};

// ---------------------------------------------------------------------------
// NewTransaction
// ---------------------------------------------------------------------------

/// A create request, before it has an id or an initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Amount,
    pub recipient: String,
    #[serde(default)]
    pub description: String,
}

impl NewTransaction {
    pub fn new(amount: Amount, recipient: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount,
            recipient: recipient.into(),
            description: description.into(),
        }
    }

    /// Structural checks. Cheap ones first.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.amount.is_zero() {
            return Err(LedgerError::Validation("amount must be > 0".into()));
        }
        if self.amount.currency.code().trim().is_empty() {
            return Err(LedgerError::Validation("currency code is empty".into()));
        }
        let recipient = self.recipient.trim();
        if recipient.is_empty() {
            return Err(LedgerError::Validation("recipient is required".into()));
        }
        if recipient.len() > MAX_RECIPIENT_LENGTH {
            return Err(LedgerError::Validation(format!(
                "recipient exceeds {} bytes",
                MAX_RECIPIENT_LENGTH
            )));
        }
        if self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(LedgerError::Validation(format!(
                "description exceeds {} bytes",
                MAX_DESCRIPTION_LENGTH
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SignatureRecord
// ---------------------------------------------------------------------------

/// One accepted approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signer_id: String,
    /// Raw signature blob exactly as the signer produced it.
    pub signature: Vec<u8>,
    pub signed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A multi-signature transfer and everything that has happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// UUID v4, assigned at creation.
    pub id: String,
    pub amount: Amount,
    pub recipient: String,
    pub description: String,
    pub initiator_id: String,
    /// Quorum threshold, fixed at creation.
    pub required_signatures: u32,
    /// Accepted signatures in acceptance order. Signer ids are unique.
    pub signatures: Vec<SignatureRecord>,
    pub status: TransactionStatus,
    /// Bumped on every committed mutation. The compare-and-set key.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    /// Present iff `status == Executed`.
    pub settlement: Option<SettlementReceipt>,
    /// Held by the execute call currently talking to settlement.
    pub settlement_claim: Option<SettlementClaim>,
}

impl Transaction {
    /// Build a fresh `Pending` record from a validated request.
    pub fn create(
        request: NewTransaction,
        initiator_id: impl Into<String>,
        required_signatures: u32,
        now: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        request.validate()?;
        if required_signatures == 0 {
            return Err(LedgerError::Validation(
                "required signatures must be positive".into(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            amount: request.amount,
            recipient: request.recipient.trim().to_string(),
            description: request.description,
            initiator_id: initiator_id.into(),
            required_signatures,
            signatures: Vec::new(),
            status: TransactionStatus::Pending,
            version: 0,
            created_at: now,
            approved_at: None,
            executed_at: None,
            rejected_at: None,
            rejected_by: None,
            rejection_reason: None,
            settlement: None,
            settlement_claim: None,
        })
    }

    /// The canonical byte encoding of the immutable fields.
    ///
    /// Each variable-length field is prefixed with its length as a u64 LE so
    /// no two distinct field tuples encode to the same bytes.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            DIGEST_DOMAIN_TAG.len() + 64 + self.recipient.len() + self.description.len(),
        );
        buf.extend_from_slice(DIGEST_DOMAIN_TAG);
        push_field(&mut buf, self.id.as_bytes());
        buf.extend_from_slice(&self.amount.value.to_le_bytes());
        push_field(&mut buf, self.amount.currency.code().as_bytes());
        push_field(&mut buf, self.recipient.as_bytes());
        push_field(&mut buf, self.description.as_bytes());
        buf
    }

    /// SHA-256 of [`Self::signable_bytes`]. This is what approvers sign.
    pub fn digest(&self) -> [u8; 32] {
        sha256_array(&self.signable_bytes())
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }

    pub fn has_signed(&self, signer_id: &str) -> bool {
        self.signatures.iter().any(|s| s.signer_id == signer_id)
    }

    pub fn signature_count(&self) -> u32 {
        self.signatures.len() as u32
    }

    pub fn signers(&self) -> impl Iterator<Item = &str> {
        self.signatures.iter().map(|s| s.signer_id.as_str())
    }

    pub fn quorum_reached(&self) -> bool {
        self.signature_count() >= self.required_signatures
    }

    /// `true` while an execute call owns the settlement claim.
    pub fn settlement_in_progress(&self) -> bool {
        self.settlement_claim.is_some()
    }

    /// Build the `InvalidState` error for this record.
    pub fn invalid_state(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::InvalidState {
            tx_id: self.id.clone(),
            status: self.status,
            reason: reason.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// `Ok` iff a *new* signer may still sign.
    pub fn ensure_signable(&self) -> LedgerResult<()> {
        match self.status {
            TransactionStatus::Pending => Ok(()),
            TransactionStatus::Approved => Err(self.invalid_state("quorum already reached")),
            TransactionStatus::Executed | TransactionStatus::Rejected => {
                Err(self.invalid_state("no further signatures accepted"))
            }
        }
    }

    /// Append a signature and, if it completes the quorum, approve.
    ///
    /// Returns the next record and whether this append fired the
    /// `Pending -> Approved` transition. The caller has already handled the
    /// idempotent case: a signer that is present is a logic error here.
    pub fn with_signature(
        &self,
        signature: SignatureRecord,
    ) -> LedgerResult<(Transaction, bool)> {
        if self.has_signed(&signature.signer_id) {
            return Err(self.invalid_state(format!(
                "{} has already signed",
                signature.signer_id
            )));
        }
        self.ensure_signable()?;

        let mut next = self.clone();
        let signed_at = signature.signed_at;
        next.signatures.push(signature);
        next.version += 1;

        let approved_now = next.quorum_reached();
        if approved_now {
            next.status = TransactionStatus::Approved;
            next.approved_at = Some(signed_at);
            debug_assert!(self.status.can_transition_to(next.status));
        }
        Ok((next, approved_now))
    }

    /// Take the settlement claim. Only an `Approved`, unclaimed record
    /// can be claimed.
    pub fn with_claim(&self, claim: SettlementClaim) -> LedgerResult<Transaction> {
        self.ensure_executable()?;
        let mut next = self.clone();
        next.settlement_claim = Some(claim);
        next.version += 1;
        Ok(next)
    }

    /// `true` if the claim currently held is `claim_id`.
    pub fn holds_claim(&self, claim_id: &str) -> bool {
        self.settlement_claim
            .as_ref()
            .is_some_and(|c| c.claim_id == claim_id)
    }

    /// Drop claim `claim_id`, leaving the record `Approved`.
    pub fn with_claim_released(&self, claim_id: &str) -> LedgerResult<Transaction> {
        if !self.holds_claim(claim_id) {
            return Err(self.invalid_state("settlement claim not held"));
        }
        let mut next = self.clone();
        next.settlement_claim = None;
        next.version += 1;
        Ok(next)
    }

    /// Commit a confirmed settlement under claim `claim_id`.
    pub fn with_settlement(
        &self,
        claim_id: &str,
        receipt: SettlementReceipt,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction> {
        if self.status != TransactionStatus::Approved || !self.holds_claim(claim_id) {
            return Err(self.invalid_state("settlement claim not held"));
        }
        let mut next = self.clone();
        next.status = TransactionStatus::Executed;
        next.executed_at = Some(now);
        next.settlement = Some(receipt);
        next.settlement_claim = None;
        next.version += 1;
        debug_assert!(self.status.can_transition_to(next.status));
        Ok(next)
    }

    /// Move to `Rejected` from `Pending` or an unclaimed `Approved`.
    pub fn with_rejection(
        &self,
        rejected_by: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::Validation("rejection reason is required".into()));
        }
        if reason.len() > MAX_REASON_LENGTH {
            return Err(LedgerError::Validation(format!(
                "rejection reason exceeds {} bytes",
                MAX_REASON_LENGTH
            )));
        }
        match self.status {
            TransactionStatus::Pending => {}
            TransactionStatus::Approved if self.settlement_in_progress() => {
                return Err(self.invalid_state("settlement in progress"));
            }
            TransactionStatus::Approved => {}
            TransactionStatus::Executed => return Err(self.invalid_state("already executed")),
            TransactionStatus::Rejected => return Err(self.invalid_state("already rejected")),
        }
        let mut next = self.clone();
        next.status = TransactionStatus::Rejected;
        next.rejected_at = Some(now);
        next.rejected_by = Some(rejected_by.to_string());
        next.rejection_reason = Some(reason.to_string());
        next.version += 1;
        debug_assert!(self.status.can_transition_to(next.status));
        Ok(next)
    }

    /// `Ok` iff `execute` may claim this record right now.
    pub fn ensure_executable(&self) -> LedgerResult<()> {
        match self.status {
            TransactionStatus::Approved if self.settlement_in_progress() => {
                Err(self.invalid_state("settlement in progress"))
            }
            TransactionStatus::Approved => Ok(()),
            TransactionStatus::Pending => Err(self.invalid_state("not yet approved")),
            TransactionStatus::Executed => Err(self.invalid_state("already executed")),
            TransactionStatus::Rejected => Err(self.invalid_state("rejected")),
        }
    }
}

fn push_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u64).to_le_bytes());
    buf.extend_from_slice(field);
}

// ---------------------------------------------------------------------------
// TransactionView
// ---------------------------------------------------------------------------

/// Read-only projection handed to callers and serialized over HTTP.
///
/// Signature blobs are not included; `signed_by` is what the approvals
/// screen needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub amount_display: String,
    pub recipient: String,
    pub description: String,
    pub initiator_id: String,
    pub required_signatures: u32,
    pub signature_count: u32,
    pub signed_by: Vec<String>,
    pub status: TransactionStatus,
    pub version: u64,
    /// Hex SHA-256 digest external signers sign.
    pub digest: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub settlement_reference: Option<String>,
    pub settlement_in_progress: bool,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.clone(),
            amount: tx.amount.value,
            currency: tx.amount.currency.code().to_string(),
            amount_display: tx.amount.display_decimal(),
            recipient: tx.recipient.clone(),
            description: tx.description.clone(),
            initiator_id: tx.initiator_id.clone(),
            required_signatures: tx.required_signatures,
            signature_count: tx.signature_count(),
            signed_by: tx.signers().map(str::to_string).collect(),
            status: tx.status,
            version: tx.version,
            digest: tx.digest_hex(),
            created_at: tx.created_at,
            approved_at: tx.approved_at,
            executed_at: tx.executed_at,
            rejected_at: tx.rejected_at,
            rejected_by: tx.rejected_by.clone(),
            rejection_reason: tx.rejection_reason.clone(),
            settlement_reference: tx.settlement.as_ref().map(|r| r.reference.clone()),
            settlement_in_progress: tx.settlement_in_progress(),
        }
    }
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self::from(&tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Currency;

    fn sample(required: u32) -> Transaction {
        Transaction::create(
            NewTransaction::new(Amount::new(1_000_000, Currency::USD), "ACME-001", "Q3 vendor payment"),
            "alice",
            required,
            Utc::now(),
        )
        .unwrap()
    }

    fn sig(signer: &str) -> SignatureRecord {
        SignatureRecord {
            signer_id: signer.into(),
            signature: vec![0xAB; 64],
            signed_at: Utc::now(),
        }
    }

    fn receipt(tx: &Transaction) -> SettlementReceipt {
        SettlementReceipt {
            reference: "stl-1".into(),
            idempotency_key: tx.id.clone(),
            settled_at: Utc::now(),
        }
    }

    #[test]
    fn create_rejects_bad_requests() {
        let zero = NewTransaction::new(Amount::new(0, Currency::USD), "ACME", "");
        assert!(matches!(zero.validate(), Err(LedgerError::Validation(_))));

        let blank = NewTransaction::new(Amount::new(5, Currency::USD), "   ", "");
        assert!(matches!(blank.validate(), Err(LedgerError::Validation(_))));

        let long = NewTransaction::new(
            Amount::new(5, Currency::USD),
            "ACME",
            "x".repeat(MAX_DESCRIPTION_LENGTH + 1),
        );
        assert!(matches!(long.validate(), Err(LedgerError::Validation(_))));

        let ok = NewTransaction::new(Amount::new(5, Currency::USD), "ACME", "");
        assert!(matches!(
            Transaction::create(ok, "alice", 0, Utc::now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn new_record_is_pending_and_empty() {
        let tx = sample(3);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.version, 0);
        assert!(tx.signatures.is_empty());
        assert!(tx.approved_at.is_none());
        assert!(Uuid::parse_str(&tx.id).is_ok());
    }

    #[test]
    fn digest_ignores_mutable_fields() {
        let tx = sample(2);
        let before = tx.digest();
        let (signed, _) = tx.with_signature(sig("bob")).unwrap();
        assert_eq!(signed.digest(), before);
        assert_eq!(tx.digest_hex().len(), 64);
    }

    #[test]
    fn digest_covers_immutable_fields() {
        let tx = sample(2);
        let mut other = tx.clone();
        other.recipient = "ACME-002".into();
        assert_ne!(other.digest(), tx.digest());

        let mut other = tx.clone();
        other.amount.value += 1;
        assert_ne!(other.digest(), tx.digest());

        let mut other = tx.clone();
        other.amount.currency = Currency::EUR;
        assert_ne!(other.digest(), tx.digest());
    }

    #[test]
    fn digest_field_boundaries_are_unambiguous() {
        let mut a = sample(2);
        a.recipient = "AB".into();
        a.description = "C".into();
        let mut b = a.clone();
        b.recipient = "A".into();
        b.description = "BC".into();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn quorum_crossing_approves_exactly_once() {
        let tx = sample(2);
        let (tx, approved) = tx.with_signature(sig("bob")).unwrap();
        assert!(!approved);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.version, 1);

        let (tx, approved) = tx.with_signature(sig("carol")).unwrap();
        assert!(approved);
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert!(tx.approved_at.is_some());
        assert_eq!(tx.version, 2);

        let err = tx.with_signature(sig("dave")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn duplicate_signer_is_refused_at_record_level() {
        let (tx, _) = sample(3).with_signature(sig("bob")).unwrap();
        assert!(tx.with_signature(sig("bob")).is_err());
    }

    #[test]
    fn claim_then_settle() {
        let (tx, _) = sample(1).with_signature(sig("bob")).unwrap();
        let claim = SettlementClaim::new("admin", Utc::now());
        let claim_id = claim.claim_id.clone();
        let claimed = tx.with_claim(claim).unwrap();
        assert_eq!(claimed.status, TransactionStatus::Approved);
        assert!(claimed.settlement_in_progress());

        // A second claim and a reject both see the claim.
        assert!(claimed
            .with_claim(SettlementClaim::new("alice", Utc::now()))
            .is_err());
        assert!(claimed.with_rejection("admin", "changed mind", Utc::now()).is_err());

        let executed = claimed
            .with_settlement(&claim_id, receipt(&claimed), Utc::now())
            .unwrap();
        assert_eq!(executed.status, TransactionStatus::Executed);
        assert!(executed.executed_at.is_some());
        assert!(executed.settlement.is_some());
        assert!(!executed.settlement_in_progress());
    }

    #[test]
    fn released_claim_is_executable_again() {
        let (tx, _) = sample(1).with_signature(sig("bob")).unwrap();
        let claim = SettlementClaim::new("admin", Utc::now());
        let claim_id = claim.claim_id.clone();
        let claimed = tx.with_claim(claim).unwrap();

        assert!(claimed.with_claim_released("someone-else").is_err());
        let released = claimed.with_claim_released(&claim_id).unwrap();
        assert_eq!(released.status, TransactionStatus::Approved);
        assert!(released.executed_at.is_none());
        assert!(released.ensure_executable().is_ok());
        assert_eq!(released.version, claimed.version + 1);
    }

    #[test]
    fn settle_requires_own_claim() {
        let (tx, _) = sample(1).with_signature(sig("bob")).unwrap();
        assert!(tx.with_settlement("none", receipt(&tx), Utc::now()).is_err());

        let claimed = tx.with_claim(SettlementClaim::new("admin", Utc::now())).unwrap();
        assert!(claimed
            .with_settlement("stolen", receipt(&claimed), Utc::now())
            .is_err());
    }

    #[test]
    fn pending_is_not_executable() {
        let tx = sample(2);
        let err = tx.ensure_executable().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("invalid state: transaction {} is pending, not yet approved", tx.id)
        );
    }

    #[test]
    fn rejection_rules() {
        let tx = sample(2);
        assert!(matches!(
            tx.with_rejection("admin", "  ", Utc::now()),
            Err(LedgerError::Validation(_))
        ));

        let rejected = tx.with_rejection("admin", "duplicate invoice", Utc::now()).unwrap();
        assert_eq!(rejected.status, TransactionStatus::Rejected);
        assert_eq!(rejected.rejected_by.as_deref(), Some("admin"));
        assert_eq!(rejected.rejection_reason.as_deref(), Some("duplicate invoice"));

        assert!(rejected.with_rejection("admin", "again", Utc::now()).is_err());
        assert!(rejected.with_signature(sig("bob")).is_err());
        assert!(rejected.ensure_executable().is_err());
    }

    #[test]
    fn view_reflects_record() {
        let (tx, _) = sample(3).with_signature(sig("bob")).unwrap();
        let view = TransactionView::from(&tx);
        assert_eq!(view.signature_count, 1);
        assert_eq!(view.signed_by, vec!["bob".to_string()]);
        assert_eq!(view.amount_display, "10000.00 USD");
        assert_eq!(view.digest, tx.digest_hex());
        assert!(!view.settlement_in_progress);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn record_survives_bincode() {
        let (tx, _) = sample(1).with_signature(sig("bob")).unwrap();
        let claimed = tx.with_claim(SettlementClaim::new("admin", Utc::now())).unwrap();
        let bytes = bincode::serialize(&claimed).unwrap();
        let back: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, claimed);
    }
}
