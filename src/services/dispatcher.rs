// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Asynchronous processing of verified webhook notifications.
//!
//! Each notification in a batch is handled on its own: the owner's token
//! is resolved, then the downstream action runs with it. A failure only
//! affects the notification it happened on.

use crate::error::ProviderError;
use crate::models::Notification;
use crate::services::credentials::CredentialManager;
use crate::services::fitbit::FitbitClient;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

const MAX_CONCURRENT_NOTIFICATIONS: usize = 8;

/// Action performed for a notification once its owner's token is known.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(
        &self,
        notification: &Notification,
        access_token: &str,
    ) -> Result<(), ProviderError>;
}

/// Default action: fetch the owner's profile and log it.
#[derive(Clone)]
pub struct ProfileFetchHandler {
    client: FitbitClient,
}

impl ProfileFetchHandler {
    pub fn new(client: FitbitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationHandler for ProfileFetchHandler {
    async fn handle(
        &self,
        notification: &Notification,
        access_token: &str,
    ) -> Result<(), ProviderError> {
        let profile = self.client.get_profile(access_token).await?;
        tracing::info!(
            owner_id = %notification.owner_id,
            profile_id = %profile.id,
            display_name = %profile.display_name,
            "Profile fetched"
        );
        Ok(())
    }
}

/// Terminal state of one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// No usable credential for the owner.
    Skipped,
    /// Downstream call failed.
    Failed,
}

/// Per-batch tally, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Routes notifications to their owners' credentials and the downstream action.
#[derive(Clone)]
pub struct Dispatcher {
    credentials: CredentialManager,
    handler: Arc<dyn NotificationHandler>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl Dispatcher {
    pub fn new(
        credentials: CredentialManager,
        handler: Arc<dyn NotificationHandler>,
        max_attempts: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            credentials,
            handler,
            max_attempts: max_attempts.max(1),
            retry_backoff,
        }
    }

    /// Process a batch on a background task and return immediately.
    pub fn spawn(&self, notifications: Vec<Notification>) -> JoinHandle<DispatchSummary> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(notifications).await })
    }

    /// Process every notification of a batch. Order is not preserved.
    pub async fn dispatch(&self, notifications: Vec<Notification>) -> DispatchSummary {
        let total = notifications.len();
        let outcomes: Vec<Outcome> = stream::iter(notifications)
            .map(|notification| {
                let span = tracing::info_span!(
                    "notification",
                    owner_id = %notification.owner_id,
                    collection_type = %notification.collection_type,
                    date = %notification.date,
                    subscription_id = %notification.subscription_id,
                );
                let dispatcher = self.clone();
                async move { dispatcher.dispatch_one(&notification).await }.instrument(span)
            })
            .buffer_unordered(MAX_CONCURRENT_NOTIFICATIONS)
            .collect()
            .await;

        let mut summary = DispatchSummary::default();
        for outcome in outcomes {
            summary.record(outcome);
        }

        tracing::info!(
            total,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Notification batch processed"
        );
        summary
    }

    async fn dispatch_one(&self, notification: &Notification) -> Outcome {
        let access_token = match self
            .credentials
            .get_valid_token(&notification.owner_id)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping notification, no valid token");
                return Outcome::Skipped;
            }
        };

        let mut attempt = 1;
        loop {
            match self.handler.handle(notification, &access_token).await {
                Ok(()) => {
                    tracing::debug!(attempt, "Notification handled");
                    return Outcome::Completed;
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(attempt, error = %e, "Downstream call failed, retrying");
                    tokio::time::sleep(self.retry_backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Notification failed");
                    return Outcome::Failed;
                }
            }
        }
    }
}
