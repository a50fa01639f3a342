// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Authorization Policy
//!
//! Who may create, sign, execute and reject. Pure decisions over data: no
//! I/O, no clocks, no state. The engine asks; the policy answers.
//!
//! ## Design
//!
//! The rules are a [`RoleMatrix`] (which roles hold which capability, plus
//! two flags about the initiator) and a [`QuorumPolicy`] (k and n). Both
//! deserialize from the ledger config, so changing "3 of 5" to "2 of 3",
//! or letting approvers execute, never touches the state machine.
//!
//! Defaults:
//!
//! | capability | roles               | initiator of the tx        |
//! |------------|---------------------|----------------------------|
//! | create     | initiator, admin    |                            |
//! | sign       | approval, admin     | allowed (`initiator_may_sign`) |
//! | execute    | admin               | allowed (`initiator_may_execute`) |
//! | reject     | same as execute     | same as execute            |

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_APPROVER_POOL_SIZE, DEFAULT_REQUIRED_SIGNATURES};
use crate::identity::{Principal, Role};
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// RoleMatrix
// ---------------------------------------------------------------------------

/// Capability sets per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleMatrix {
    pub create: BTreeSet<Role>,
    pub sign: BTreeSet<Role>,
    pub execute: BTreeSet<Role>,
    /// The transaction's own initiator may execute or reject it.
    pub initiator_may_execute: bool,
    /// A signing-capable principal may sign a transaction they initiated.
    pub initiator_may_sign: bool,
}

impl Default for RoleMatrix {
    fn default() -> Self {
        Self {
            create: BTreeSet::from([Role::Initiator, Role::Admin]),
            sign: BTreeSet::from([Role::Approval, Role::Admin]),
            execute: BTreeSet::from([Role::Admin]),
            initiator_may_execute: true,
            initiator_may_sign: true,
        }
    }
}

// ---------------------------------------------------------------------------
// QuorumPolicy
// ---------------------------------------------------------------------------

/// k-of-n.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub required_signatures: u32,
    pub approver_pool_size: u32,
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self {
            required_signatures: DEFAULT_REQUIRED_SIGNATURES,
            approver_pool_size: DEFAULT_APPROVER_POOL_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthorizationPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    pub roles: RoleMatrix,
    pub quorum: QuorumPolicy,
}

impl AuthorizationPolicy {
    pub fn new(roles: RoleMatrix, quorum: QuorumPolicy) -> Self {
        Self { roles, quorum }
    }

    pub fn can_create(&self, principal: &Principal) -> bool {
        self.roles.create.contains(&principal.role)
    }

    /// Role-level signing capability. Also defines approver pool
    /// membership.
    pub fn can_sign(&self, principal: &Principal) -> bool {
        self.roles.sign.contains(&principal.role)
    }

    /// [`Self::can_sign`] plus the self-signing rule for this transaction.
    pub fn can_sign_transaction(&self, principal: &Principal, tx: &Transaction) -> bool {
        self.can_sign(principal)
            && (self.roles.initiator_may_sign || principal.id != tx.initiator_id)
    }

    pub fn can_execute(&self, principal: &Principal, tx: &Transaction) -> bool {
        self.roles.execute.contains(&principal.role)
            || (self.roles.initiator_may_execute && principal.id == tx.initiator_id)
    }

    /// Rejection follows the execute rule.
    pub fn can_reject(&self, principal: &Principal, tx: &Transaction) -> bool {
        self.can_execute(principal, tx)
    }

    pub fn required_signatures(&self) -> u32 {
        self.quorum.required_signatures
    }

    pub fn approver_pool_size(&self) -> u32 {
        self.quorum.approver_pool_size
    }
}
