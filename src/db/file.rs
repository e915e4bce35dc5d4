// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File-backed credential store.
//!
//! All credentials live in one JSON document (`credentials.json`) that is
//! loaded at open and rewritten on every upsert. The rewrite goes to a
//! temporary file that is then renamed over the document, so a crash leaves
//! either the previous or the new contents on disk.

use super::CredentialStore;
use crate::error::StoreError;
use crate::models::Credential;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const FILE_NAME: &str = "credentials.json";

/// Credential store persisted to a JSON document on local disk.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    credentials: Arc<RwLock<BTreeMap<String, Credential>>>,
}

impl FileStore {
    /// Open (or create) the store under `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(FILE_NAME);

        let credentials = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            users = credentials.len(),
            "Opened credential file store"
        );

        Ok(Self {
            path,
            credentials: Arc::new(RwLock::new(credentials)),
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, credentials: &BTreeMap<String, Credential>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(credentials)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.read().await.get(user_id).cloned())
    }

    async fn upsert(&self, credential: &Credential) -> Result<(), StoreError> {
        // Write lock is held across the file write so documents land in
        // the same order as the in-memory updates.
        let mut credentials = self.credentials.write().await;
        let previous = credentials.insert(credential.user_id.clone(), credential.clone());

        if let Err(e) = self.persist(&credentials).await {
            match previous {
                Some(prev) => credentials.insert(credential.user_id.clone(), prev),
                None => credentials.remove(&credential.user_id),
            };
            return Err(e);
        }
        Ok(())
    }
}
