// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Prometheus Metrics
//!
//! Ledger counters, scraped at `/metrics` on the metrics port. Everything
//! is fed from the ledger's event channel by [`track_ledger_events`], so
//! no handler has to remember to count anything.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] under the
//! `quorum` namespace.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use tokio::sync::broadcast;

use quorum_protocol::{LedgerEvent, QuorumLedger};

#[derive(Clone)]
pub struct QuorumMetrics {
    registry: Registry,
    pub transactions_created_total: IntCounter,
    pub signatures_accepted_total: IntCounter,
    pub approvals_total: IntCounter,
    pub executions_total: IntCounter,
    pub settlement_failures_total: IntCounter,
    pub rejections_total: IntCounter,
    pub claims_released_total: IntCounter,
    /// Transactions currently awaiting signatures.
    pub pending_transactions: IntGauge,
    pub settlement_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let metric = IntCounter::new(name, help).expect("metric creation");
    registry
        .register(Box::new(metric.clone()))
        .expect("metric registration");
    metric
}

impl QuorumMetrics {
    /// Create and register all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("quorum".into()), None)
            .expect("failed to create prometheus registry");

        let transactions_created_total = counter(
            &registry,
            "transactions_created_total",
            "Transactions proposed",
        );
        let signatures_accepted_total = counter(
            &registry,
            "signatures_accepted_total",
            "Valid approver signatures recorded",
        );
        let approvals_total = counter(
            &registry,
            "approvals_total",
            "Transactions that reached their signature quorum",
        );
        let executions_total = counter(
            &registry,
            "executions_total",
            "Transactions settled and marked executed",
        );
        let settlement_failures_total = counter(
            &registry,
            "settlement_failures_total",
            "Settlement calls that failed or timed out",
        );
        let rejections_total = counter(&registry, "rejections_total", "Transactions rejected");
        let claims_released_total = counter(
            &registry,
            "claims_released_total",
            "Stale settlement claims released by recovery",
        );

        let pending_transactions = IntGauge::new(
            "pending_transactions",
            "Transactions awaiting signatures",
        )
        .expect("metric creation");
        registry
            .register(Box::new(pending_transactions.clone()))
            .expect("metric registration");

        let settlement_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "settlement_latency_seconds",
                "Wall time of successful settlement calls in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(settlement_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            transactions_created_total,
            signatures_accepted_total,
            approvals_total,
            executions_total,
            settlement_failures_total,
            rejections_total,
            claims_released_total,
            pending_transactions,
            settlement_latency_seconds,
        }
    }

    /// Count one ledger event.
    pub fn record(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::TransactionCreated { .. } => self.transactions_created_total.inc(),
            LedgerEvent::SignatureAccepted { .. } => self.signatures_accepted_total.inc(),
            LedgerEvent::TransactionApproved { .. } => self.approvals_total.inc(),
            LedgerEvent::TransactionExecuted {
                settlement_latency_ms,
                ..
            } => {
                self.executions_total.inc();
                self.settlement_latency_seconds
                    .observe(*settlement_latency_ms as f64 / 1000.0);
            }
            LedgerEvent::SettlementFailed { .. } => self.settlement_failures_total.inc(),
            LedgerEvent::TransactionRejected { .. } => self.rejections_total.inc(),
            LedgerEvent::ClaimReleased { .. } => self.claims_released_total.inc(),
        }
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<QuorumMetrics>;

/// Feed `metrics` from the ledger's event stream until the channel closes.
pub async fn track_ledger_events(
    metrics: SharedMetrics,
    ledger: Arc<QuorumLedger>,
    mut events: broadcast::Receiver<LedgerEvent>,
) {
    refresh_pending(&metrics, &ledger);
    loop {
        match events.recv().await {
            Ok(event) => {
                metrics.record(&event);
                refresh_pending(&metrics, &ledger);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "metrics tracker lagged behind ledger events");
                refresh_pending(&metrics, &ledger);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn refresh_pending(metrics: &QuorumMetrics, ledger: &QuorumLedger) {
    match ledger.stats() {
        Ok(stats) => metrics.pending_transactions.set(stats.pending as i64),
        Err(e) => tracing::warn!(error = %e, "could not read ledger stats"),
    }
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
