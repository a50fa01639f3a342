// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Principals and their roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::SignerPublicKey;

/// What a principal is allowed to be. What each role may *do* is decided
/// by [`crate::policy::RoleMatrix`], not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Proposes transfers.
    Initiator,
    /// Member of the approver pool.
    Approval,
    /// Can do everything, including execute anybody's transaction.
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Approval => "approval",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initiator" => Ok(Self::Initiator),
            "approval" | "approver" => Ok(Self::Approval),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier; this is what lands in `signatures` and audit.
    pub id: String,
    /// Display name.
    pub username: String,
    pub role: Role,
    /// Key the verifier checks this principal's signatures against.
    pub public_key: SignerPublicKey,
    pub registered_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        role: Role,
        public_key: SignerPublicKey,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
            public_key,
            registered_at: Utc::now(),
        }
    }
}
