// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! The identity directory: principal id in, role and public key out.
//!
//! In production this is an LDAP server, an IdP, a table somebody else
//! owns. [`InMemoryDirectory`] is the development stand-in, backed by a
//! `DashMap` so lookups from concurrent requests never queue behind each
//! other.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use super::principal::Principal;
use crate::error::LedgerError;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("principal already registered: {0}")]
    AlreadyRegistered(String),

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("unknown session")]
    UnknownSession,

    #[error("session expired")]
    SessionExpired,
}

impl From<IdentityError> for LedgerError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::UnknownPrincipal(_)
            | IdentityError::UnknownSession
            | IdentityError::SessionExpired => LedgerError::Unauthorized(err.to_string()),
            IdentityError::AlreadyRegistered(_) | IdentityError::InvalidPrincipal(_) => {
                LedgerError::Validation(err.to_string())
            }
        }
    }
}

/// Resolves principal ids.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn resolve(&self, principal_id: &str) -> Result<Principal, IdentityError>;

    async fn register(&self, principal: Principal) -> Result<(), IdentityError>;

    /// Every registered principal, sorted by id.
    async fn list(&self) -> Vec<Principal>;
}

/// In-process directory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    principals: DashMap<String, Principal>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn resolve(&self, principal_id: &str) -> Result<Principal, IdentityError> {
        self.principals
            .get(principal_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| IdentityError::UnknownPrincipal(principal_id.to_string()))
    }

    async fn register(&self, principal: Principal) -> Result<(), IdentityError> {
        if principal.id.trim().is_empty() {
            return Err(IdentityError::InvalidPrincipal("id is empty".into()));
        }
        match self.principals.entry(principal.id.clone()) {
            Entry::Occupied(_) => Err(IdentityError::AlreadyRegistered(principal.id)),
            Entry::Vacant(slot) => {
                slot.insert(principal);
                Ok(())
            }
        }
    }

    async fn list(&self) -> Vec<Principal> {
        let mut all: Vec<Principal> = self.principals.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
