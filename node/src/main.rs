// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quorum Node
//!
//! Entry point for the `quorum-node` binary. Parses CLI arguments, sets up
//! logging and metrics, assembles the ledger and serves the HTTP/WS API.
//!
//! Subcommands:
//!
//! - `run`     start the node
//! - `keygen`  generate an approver signing key
//! - `sign`    sign a transaction digest with a key file (offline signer)
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;

use quorum_protocol::config::{LedgerConfig, PROTOCOL_VERSION};
use quorum_protocol::crypto::{SignerKeypair, SignerPublicKey};
use quorum_protocol::identity::{Principal, Role, SessionRegistry};
use quorum_protocol::storage::{MemoryStore, SledStore, TransactionStore};
use quorum_protocol::{MemoryAuditLog, QuorumLedger};

use cli::{Commands, QuorumNodeCli, StoreKind};
use logging::LogFormat;
use metrics::QuorumMetrics;

/// How often expired sessions are swept from the registry.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const CLAIM_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = QuorumNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Sign(args) => sign_digest(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Ledger config from the optional file, with CLI overrides applied.
fn load_config(args: &cli::RunArgs) -> Result<LedgerConfig> {
    let mut config = match &args.config {
        Some(path) => LedgerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LedgerConfig::default(),
    };

    if let Some(k) = args.required_signatures {
        config.required_signatures = k;
    }
    if let Some(n) = args.approver_pool_size {
        config.approver_pool_size = n;
    }
    if let Some(ms) = args.verify_timeout_ms {
        config.verify_timeout_ms = ms;
    }
    if let Some(ms) = args.settlement_timeout_ms {
        config.settlement_timeout_ms = ms;
    }
    config.validate().context("invalid ledger configuration")?;
    Ok(config)
}

fn open_store(kind: StoreKind, data_dir: &Path) -> Result<Arc<dyn TransactionStore>> {
    match kind {
        StoreKind::Memory => {
            tracing::warn!("using the in-memory store; transactions will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Sled => {
            let db_path = data_dir.join("ledger");
            std::fs::create_dir_all(&db_path).with_context(|| {
                format!("failed to create database directory: {}", db_path.display())
            })?;
            let store = SledStore::open(&db_path)
                .with_context(|| format!("failed to open database at {}", db_path.display()))?;
            tracing::info!(path = %db_path.display(), records = store.len().unwrap_or(0), "database opened");
            Ok(Arc::new(store))
        }
    }
}

/// Assemble the ledger and serve it until a shutdown signal.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, LogFormat::from_str_lossy(&args.log_format));

    let config = load_config(&args)?;
    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        store = ?args.store,
        required_signatures = config.required_signatures,
        approver_pool_size = config.approver_pool_size,
        "starting quorum-node"
    );

    // --- Ledger ---
    let store = open_store(args.store, &args.data_dir)?;
    let audit = Arc::new(MemoryAuditLog::new());
    let claim_expiry = config.claim_expiry();
    let ledger = Arc::new(
        QuorumLedger::builder(config)
            .store(store)
            .audit(audit.clone())
            .build()
            .context("failed to assemble ledger")?,
    );

    if let Some(key_hex) = &args.bootstrap_admin {
        let public_key = SignerPublicKey::from_hex(key_hex).context("invalid --bootstrap-admin key")?;
        let admin = Principal::new(&args.admin_id, &args.admin_id, Role::Admin, public_key);
        ledger
            .bootstrap_admin(admin)
            .await
            .context("failed to register bootstrap admin")?;
        tracing::info!(admin = %args.admin_id, "bootstrap admin registered");
    } else {
        tracing::warn!("no --bootstrap-admin given; nobody can register principals");
    }

    // A claim left behind by a crashed process would block its transaction.
    let released = ledger
        .release_stale_claims(claim_expiry)
        .context("failed to release stale settlement claims")?;
    if released > 0 {
        tracing::warn!(released, "released settlement claims left by a previous run");
    }

    let claim_sweeper = {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLAIM_SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                match ledger.release_stale_claims(claim_expiry) {
                    Ok(0) => {}
                    Ok(released) => tracing::warn!(released, "released stale settlement claims"),
                    Err(e) => tracing::error!(error = %e, "stale claim sweep failed"),
                }
            }
        })
    };

    // --- Metrics ---
    let node_metrics = Arc::new(QuorumMetrics::new());
    let tracker = tokio::spawn(metrics::track_ledger_events(
        Arc::clone(&node_metrics),
        Arc::clone(&ledger),
        ledger.subscribe(),
    ));

    // --- Sessions ---
    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(args.session_ttl_secs)));
    let sweeper = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let purged = sessions.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "expired sessions purged");
                }
            }
        })
    };

    let app_state = api::AppState {
        version: format!("{} (protocol v{})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        ledger: Arc::clone(&ledger),
        sessions,
        audit,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "API server error");
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "metrics server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracker.abort();
    sweeper.abort();
    claim_sweeper.abort();
    tracing::info!("quorum-node stopped");
    Ok(())
}

/// Generate a signing key and write its hex secret to `args.out`.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    if args.out.exists() {
        bail!("{} already exists; refusing to overwrite a key", args.out.display());
    }

    let keypair = SignerKeypair::generate();
    std::fs::write(&args.out, keypair.secret_key_hex())
        .with_context(|| format!("failed to write key to {}", args.out.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&args.out, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("Key written    : {}", args.out.display());
    println!("Public key     : {}", keypair.public_key().to_hex());
    Ok(())
}

/// Sign a hex digest with a key file and print the hex signature.
fn sign_digest(args: cli::SignArgs) -> Result<()> {
    let secret = std::fs::read_to_string(&args.key)
        .with_context(|| format!("failed to read key file {}", args.key.display()))?;
    let keypair = SignerKeypair::from_hex(secret.trim()).context("key file is not a valid hex key")?;
    let digest = hex::decode(args.digest.trim()).context("digest must be hex")?;
    if digest.len() != 32 {
        bail!("digest must be 32 bytes, got {}", digest.len());
    }

    println!("{}", hex::encode(keypair.sign(&digest)));
    Ok(())
}

fn print_version() {
    println!("quorum-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    v{}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
