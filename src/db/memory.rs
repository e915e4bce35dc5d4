// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store.

use super::CredentialStore;
use crate::error::StoreError;
use crate::models::Credential;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Credential store backed by a `DashMap`. Used by tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    credentials: Arc<DashMap<String, Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users on file.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.get(user_id).map(|c| c.clone()))
    }

    async fn upsert(&self, credential: &Credential) -> Result<(), StoreError> {
        self.credentials
            .insert(credential.user_id.clone(), credential.clone());
        Ok(())
    }
}
