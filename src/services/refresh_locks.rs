// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user refresh locks.
//!
//! Locks are created on first use and dropped from the registry when the
//! last task holding or waiting on them lets go, so the map only holds
//! users with a refresh in progress.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-user mutexes. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct RefreshLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RefreshLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s refresh section.
    ///
    /// Users never contend with each other.
    pub async fn acquire(&self, user_id: &str) -> RefreshGuard {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Built before waiting so a cancelled acquire still runs the reclaim
        // in `Drop`. The pending `lock_owned` future, which owns `lock`, is
        // dropped before it.
        let mut guard = RefreshGuard {
            guard: None,
            locks: self.locks.clone(),
            user_id: user_id.to_string(),
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    /// Number of users with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one user's check-and-refresh.
///
/// `guard` is `None` only while `acquire` is still waiting.
pub struct RefreshGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    user_id: String,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        // Release first so the guard's own reference is gone before counting.
        drop(self.guard.take());

        // Only the registry's reference left: nobody holds or waits on it.
        // Clones are taken under the shard lock, so this cannot race.
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
