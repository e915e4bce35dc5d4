// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit-Subscriber API Server
//!
//! Accepts Fitbit sign-ins, stores their OAuth credentials and processes
//! Fitbit subscription notifications.

use fitbit_subscriber::{
    config::{Config, StoreBackend},
    db::{CredentialStore, FileStore, FirestoreStore, MemoryStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Fitbit-Subscriber API");

    let store: Arc<dyn CredentialStore> = match config.store_backend {
        StoreBackend::File => Arc::new(FileStore::open(&config.data_dir).await?),
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory credential store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store)?);

    // Build router
    let app = fitbit_subscriber::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fitbit_subscriber=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
