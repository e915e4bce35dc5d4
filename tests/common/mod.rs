// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fitbit_subscriber::config::Config;
use fitbit_subscriber::db::{CredentialStore, MemoryStore};
use fitbit_subscriber::error::{ProviderError, RefreshError};
use fitbit_subscriber::models::{Credential, Notification, Profile};
use fitbit_subscriber::routes::create_router;
use fitbit_subscriber::services::{
    CredentialManager, Dispatcher, FitbitClient, NotificationHandler, TokenRefresher,
};
use fitbit_subscriber::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Build a credential for `user_id` expiring `expires_in_secs` from now.
#[allow(dead_code)]
pub fn credential(user_id: &str, access: &str, refresh: &str, expires_in_secs: i64) -> Credential {
    Credential {
        user_id: user_id.to_string(),
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        access_token_expiry: Utc::now() + Duration::seconds(expires_in_secs),
        profile: Profile {
            id: user_id.to_string(),
            display_name: format!("{} display", user_id),
            full_name: format!("{} full", user_id),
        },
    }
}

/// Truncate to whole seconds (the persisted expiry precision).
#[allow(dead_code)]
pub fn secs(date: DateTime<Utc>) -> i64 {
    date.timestamp()
}

/// What the fake refresher answers.
#[allow(dead_code)]
#[derive(Clone, Copy)]
pub enum RefreshBehavior {
    /// Issue `A{n}`/`R{n}` with an hour of lifetime.
    Rotate,
    InvalidGrant,
    Transient,
}

/// Token refresher that counts calls instead of talking to Fitbit.
pub struct FakeRefresher {
    behavior: RefreshBehavior,
    delay: std::time::Duration,
    calls: AtomicUsize,
    presented: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeRefresher {
    pub fn new(behavior: RefreshBehavior) -> Arc<Self> {
        Self::with_delay(behavior, std::time::Duration::ZERO)
    }

    pub fn with_delay(behavior: RefreshBehavior, delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            calls: AtomicUsize::new(0),
            presented: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in call order.
    pub fn presented(&self) -> Vec<String> {
        self.presented.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, RefreshError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 2;
        self.presented
            .lock()
            .unwrap()
            .push(credential.refresh_token.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behavior {
            RefreshBehavior::Rotate => Ok(credential.rotated(
                format!("A{}", n),
                format!("R{}", n),
                Utc::now() + Duration::seconds(3600),
            )),
            RefreshBehavior::InvalidGrant => Err(RefreshError::InvalidGrant(
                r#"{"errors":[{"errorType":"invalid_grant"}]}"#.to_string(),
            )),
            RefreshBehavior::Transient => Err(RefreshError::Transient("HTTP 503".to_string())),
        }
    }
}

/// Downstream handler that reports each call on a channel.
pub struct RecordingHandler {
    sender: mpsc::UnboundedSender<(String, String)>,
    calls: AtomicUsize,
    failures_before_success: AtomicUsize,
    fail_for_owner: Option<String>,
}

#[allow(dead_code)]
impl RecordingHandler {
    /// Handler plus the receiving end of `(owner_id, access_token)` reports.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String)>) {
        Self::build(0, None)
    }

    /// Fail transiently `n` times before succeeding.
    pub fn flaky(n: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String)>) {
        Self::build(n, None)
    }

    /// Fail permanently for one owner.
    pub fn failing_for(owner: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String)>) {
        Self::build(0, Some(owner.to_string()))
    }

    fn build(
        failures: usize,
        fail_for_owner: Option<String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = Arc::new(Self {
            sender,
            calls: AtomicUsize::new(0),
            failures_before_success: AtomicUsize::new(failures),
            fail_for_owner,
        });
        (handler, receiver)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationHandler for RecordingHandler {
    async fn handle(
        &self,
        notification: &Notification,
        access_token: &str,
    ) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_for_owner.as_deref() == Some(notification.owner_id.as_str()) {
            return Err(ProviderError::Status {
                status: 403,
                body: "insufficient_scope".to_string(),
            });
        }

        let remaining = self.failures_before_success.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_before_success
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Transient("connection reset".to_string()));
        }

        let _ = self
            .sender
            .send((notification.owner_id.clone(), access_token.to_string()));
        Ok(())
    }
}

/// Notification for `owner_id` in the activities collection.
#[allow(dead_code)]
pub fn notification(owner_id: &str) -> Notification {
    Notification {
        owner_id: owner_id.to_string(),
        collection_type: "activities".to_string(),
        date: "2024-01-01".to_string(),
        subscription_id: "1".to_string(),
        owner_type: Some("user".to_string()),
    }
}

/// Credential manager over `store` with a fake refresher.
#[allow(dead_code)]
pub fn manager(store: &MemoryStore, refresher: Arc<FakeRefresher>) -> CredentialManager {
    let store: Arc<dyn CredentialStore> = Arc::new(store.clone());
    CredentialManager::new(store, refresher)
}

/// Create a test app over offline fakes.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(
    store: &MemoryStore,
    refresher: Arc<FakeRefresher>,
    handler: Arc<RecordingHandler>,
) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let fitbit = FitbitClient::new(&config).expect("client builds");
    let credentials = manager(store, refresher);
    let dispatcher = Dispatcher::new(
        credentials.clone(),
        handler,
        config.dispatch_max_attempts,
        config.dispatch_retry_backoff,
    );

    let state = Arc::new(AppState {
        config,
        fitbit,
        credentials,
        dispatcher,
    });

    (create_router(state.clone()), state)
}
