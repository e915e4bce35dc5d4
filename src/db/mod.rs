// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential persistence.
//!
//! One [`Credential`] per Fitbit user, keyed by user ID. Writes are
//! upserts; the lifecycle manager serializes writers per user, so backends
//! only need last-writer-wins semantics for a single key.

pub mod file;
pub mod firestore;
pub mod memory;

pub use file::FileStore;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::Credential;
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
}

/// Keyed persistence for credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the credential for a user. `Ok(None)` when none is on file.
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, StoreError>;

    /// Insert or replace the credential for `credential.user_id`.
    async fn upsert(&self, credential: &Credential) -> Result<(), StoreError>;
}
