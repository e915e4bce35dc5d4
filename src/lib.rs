// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitbit-Subscriber: keep Fitbit OAuth credentials valid and react to
//! Fitbit subscription notifications.
//!
//! This crate stores per-user access/refresh tokens, refreshes them
//! transparently (one refresh per user at a time), verifies signed
//! webhook notifications and dispatches them off the request path.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::CredentialStore;
use services::{CredentialManager, Dispatcher, FitbitClient, ProfileFetchHandler};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub fitbit: FitbitClient,
    pub credentials: CredentialManager,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Wire the production collaborators around `store`.
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let fitbit = FitbitClient::new(&config)?;
        let credentials = CredentialManager::new(store, Arc::new(fitbit.clone()));
        let dispatcher = Dispatcher::new(
            credentials.clone(),
            Arc::new(ProfileFetchHandler::new(fitbit.clone())),
            config.dispatch_max_attempts,
            config.dispatch_retry_backoff,
        );

        Ok(Self {
            config,
            fitbit,
            credentials,
            dispatcher,
        })
    }
}
