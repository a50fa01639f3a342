// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

// Quorum ledger benchmarks.
//
// Covers the canonical digest, Ed25519 approval verification, audit
// chain appends, and a full create/sign/execute round at several quorum
// sizes against the in-memory collaborators.

use std::time::Duration;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use quorum_protocol::audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, MemoryAuditLog};
use quorum_protocol::config::LedgerConfig;
use quorum_protocol::crypto::{verify_raw, SignerKeypair};
use quorum_protocol::identity::{Principal, Role, Session};
use quorum_protocol::transaction::{Amount, Currency, NewTransaction, Transaction};
use quorum_protocol::QuorumLedger;

fn sample_request() -> NewTransaction {
    NewTransaction::new(
        Amount::new(25_000_000, Currency::EUR),
        "DE89-3704-0044-0532-0130-00",
        "Q3 supplier payment",
    )
}

fn bench_digest(c: &mut Criterion) {
    let tx = Transaction::create(sample_request(), "alice", 3, Utc::now()).unwrap();

    c.bench_function("transaction/digest", |b| {
        b.iter(|| tx.digest());
    });
}

fn bench_verify_approval(c: &mut Criterion) {
    let keypair = SignerKeypair::generate();
    let tx = Transaction::create(sample_request(), "alice", 3, Utc::now()).unwrap();
    let digest = tx.digest();
    let signature = keypair.sign(&digest);
    let public_key = keypair.public_key();

    c.bench_function("ed25519/verify_approval", |b| {
        b.iter(|| verify_raw(public_key.as_bytes(), &digest, &signature).unwrap());
    });
}

fn bench_audit_append(c: &mut Criterion) {
    let log = MemoryAuditLog::new();

    c.bench_function("audit/append_chained", |b| {
        b.iter(|| {
            log.append(
                AuditEvent::new("bob", AuditAction::SubmitSignature, "tx-1", AuditOutcome::Success)
                    .with_detail("2 of 3"),
            )
            .unwrap()
        });
    });
}

fn bench_quorum_round(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("ledger/quorum_round");

    for required in [1u32, 3, 5] {
        let config = LedgerConfig {
            required_signatures: required,
            approver_pool_size: 5,
            ..LedgerConfig::default()
        };
        let ledger = QuorumLedger::builder(config).build().unwrap();

        let root_key = SignerKeypair::generate();
        let approvers: Vec<(Session, SignerKeypair)> = rt.block_on(async {
            ledger
                .bootstrap_admin(Principal::new("root", "root", Role::Admin, root_key.public_key()))
                .await
                .unwrap();
            let root = Session::ephemeral("root", Duration::from_secs(3600));
            let mut approvers = Vec::new();
            for i in 0..required.min(4) {
                let id = format!("approver-{i}");
                let key = SignerKeypair::generate();
                ledger
                    .register_principal(&root, Principal::new(&id, &id, Role::Approval, key.public_key()))
                    .await
                    .unwrap();
                approvers.push((Session::ephemeral(id, Duration::from_secs(3600)), key));
            }
            // The fifth seat, when needed, is root itself.
            if approvers.len() < required as usize {
                approvers.push((root, root_key));
            }
            approvers
        });
        let root = Session::ephemeral("root", Duration::from_secs(3600));

        group.throughput(Throughput::Elements(required as u64));
        group.bench_with_input(BenchmarkId::from_parameter(required), &required, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let tx = ledger.create_transaction(&root, sample_request()).await.unwrap();
                    let digest = hex::decode(&tx.digest).unwrap();
                    for (session, key) in &approvers {
                        ledger
                            .sign_transaction(session, &tx.id, &key.sign(&digest))
                            .await
                            .unwrap();
                    }
                    ledger.execute_transaction(&root, &tx.id).await.unwrap()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_digest,
    bench_verify_approval,
    bench_audit_append,
    bench_quorum_round,
);
criterion_main!(benches);
