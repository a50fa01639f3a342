// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Identity Module
//!
//! Who is calling, and what are they?
//!
//! 1. **Principal**: id, display name, [`Role`], Ed25519 public key.
//! 2. **Directory**: resolves a principal id to a [`Principal`]. External
//!    in real deployments; [`InMemoryDirectory`] for everything else.
//! 3. **Session**: the explicit caller context passed into every ledger
//!    operation, issued at login and invalidated at logout.
//!
//! Authentication itself (passwords, second factors) is not here. By the
//! time a [`Session`] exists, somebody already decided the caller is who
//! they claim to be.

pub mod directory;
pub mod principal;
pub mod session;

pub use directory::{IdentityDirectory, IdentityError, InMemoryDirectory};
pub use principal::{Principal, Role};
pub use session::{Session, SessionRegistry};
