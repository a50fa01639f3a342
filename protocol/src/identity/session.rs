// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Explicit caller context.
//!
//! Every core operation takes a `&Session` instead of reading some ambient
//! "current user". A session is issued once the caller has authenticated
//! (somewhere else), resolved per request from its bearer token, and
//! invalidated at logout or when its TTL runs out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::directory::IdentityError;
use crate::config::DEFAULT_SESSION_TTL;

/// An authenticated principal's context for a sequence of calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token, 64 hex characters.
    pub token: String,
    pub principal_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session that is not tracked by any registry. The in-process
    /// engine accepts these; tests and the bootstrap path use them.
    pub fn ephemeral(principal_id: impl Into<String>, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            token: new_token(),
            principal_id: principal_id.into(),
            issued_at,
            expires_at: issued_at + to_chrono(ttl),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues and tracks sessions by token.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Issue a session for a principal that has already authenticated.
    pub fn issue(&self, principal_id: &str) -> Session {
        let session = Session::ephemeral(principal_id, self.ttl);
        self.sessions.insert(session.token.clone(), session.clone());
        debug!(principal = principal_id, "session issued");
        session
    }

    /// Look up a live session. Expired ones are evicted on the way out.
    pub fn resolve(&self, token: &str) -> Result<Session, IdentityError> {
        let session = self
            .sessions
            .get(token)
            .map(|s| s.value().clone())
            .ok_or(IdentityError::UnknownSession)?;
        if session.is_expired(Utc::now()) {
            self.sessions.remove(token);
            return Err(IdentityError::SessionExpired);
        }
        Ok(session)
    }

    /// Logout. Returns `false` if the token was not live.
    pub fn invalidate(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).is_some();
        if removed {
            debug!("session invalidated");
        }
        removed
    }

    /// Drop every expired session; returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365))
}
