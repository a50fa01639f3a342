// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CLI Interface
//!
//! Command-line structure for `quorum-node`, via `clap` derive. Every `run`
//! flag can also come from a `QUORUM_*` environment variable.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Multi-signature quorum ledger node.
///
/// Serves the quorum ledger over HTTP and WebSocket, exposes Prometheus
/// metrics, and doubles as the offline signer approvers use to produce
/// signature blobs.
#[derive(Parser, Debug)]
#[command(
    name = "quorum-node",
    about = "Multi-signature quorum ledger node",
    version,
    propagate_version = true
)]
pub struct QuorumNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the ledger node.
    Run(RunArgs),
    /// Generate an Ed25519 signing key and print its public half.
    Keygen(KeygenArgs),
    /// Sign a transaction digest with a key file.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Where transaction records live.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Process memory. Everything is gone on restart.
    Memory,
    /// sled database under the data directory.
    Sled,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Ledger configuration file (JSON). Flags below override its fields.
    #[arg(long, short = 'c', env = "QUORUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory for the sled store.
    #[arg(long, short = 'd', env = "QUORUM_DATA_DIR", default_value = "./quorum-data")]
    pub data_dir: PathBuf,

    #[arg(long, value_enum, env = "QUORUM_STORE", default_value_t = StoreKind::Sled)]
    pub store: StoreKind,

    /// Port for the REST and WebSocket API.
    #[arg(long, env = "QUORUM_RPC_PORT", default_value_t = 9851)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "QUORUM_METRICS_PORT", default_value_t = 9852)]
    pub metrics_port: u16,

    /// Signatures required for approval (k).
    #[arg(long, env = "QUORUM_REQUIRED_SIGNATURES")]
    pub required_signatures: Option<u32>,

    /// Maximum number of signing-capable principals (n).
    #[arg(long, env = "QUORUM_APPROVER_POOL_SIZE")]
    pub approver_pool_size: Option<u32>,

    #[arg(long, env = "QUORUM_VERIFY_TIMEOUT_MS")]
    pub verify_timeout_ms: Option<u64>,

    #[arg(long, env = "QUORUM_SETTLEMENT_TIMEOUT_MS")]
    pub settlement_timeout_ms: Option<u64>,

    /// Lifetime of issued sessions, in seconds.
    #[arg(long, env = "QUORUM_SESSION_TTL_SECS", default_value_t = 8 * 60 * 60)]
    pub session_ttl_secs: u64,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "QUORUM_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Hex Ed25519 public key of the admin registered at start-up.
    #[arg(long, env = "QUORUM_BOOTSTRAP_ADMIN")]
    pub bootstrap_admin: Option<String>,

    /// Principal id for the bootstrap admin.
    #[arg(long, env = "QUORUM_ADMIN_ID", default_value = "admin")]
    pub admin_id: String,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex secret key. Refuses to overwrite.
    #[arg(long, short = 'o', default_value = "signer.key")]
    pub out: PathBuf,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Key file written by `keygen`.
    #[arg(long, short = 'k', env = "QUORUM_SIGNER_KEY")]
    pub key: PathBuf,

    /// Hex transaction digest, as served by `/api/transactions/:id/digest`.
    pub digest: String,
}
