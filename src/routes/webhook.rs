// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Fitbit subscription notifications.

use crate::models::Notification;
use crate::services::signature::{self, SIGNATURE_HEADER};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook-receiver", get(verify_subscriber).post(receive))
}

/// Fitbit subscriber verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(default)]
    verify: Option<String>,
}

/// Verify subscriber endpoint (GET).
///
/// Fitbit calls this once with the correct code (expects 204) and once
/// with a wrong one (expects 404).
async fn verify_subscriber(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> StatusCode {
    let (Some(expected), Some(provided)) = (&state.config.subscriber_verify_code, params.verify)
    else {
        return StatusCode::NOT_FOUND;
    };

    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        tracing::info!("Subscriber endpoint verified");
        StatusCode::NO_CONTENT
    } else {
        tracing::debug!("Subscriber verification code mismatch");
        StatusCode::NOT_FOUND
    }
}

/// Receive a notification batch (POST).
///
/// The body is taken as raw bytes: the signature covers the exact bytes
/// Fitbit sent. The response is always 204 so a bad signature is not
/// distinguishable from a good one; processing happens after returning.
async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if !signature::verify(&body, provided, &state.config.fitbit_client_secret) {
        tracing::warn!(
            target: "audit",
            body_len = body.len(),
            signature_present = !provided.is_empty(),
            "Invalid subscription notification received"
        );
        return StatusCode::NO_CONTENT;
    }

    match Notification::parse_batch(&body) {
        Ok(batch) if batch.is_empty() => {
            tracing::debug!("Empty notification batch");
        }
        Ok(batch) => {
            tracing::info!(count = batch.len(), "Notification batch verified");
            state.dispatcher.spawn(batch);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse verified notification batch");
        }
    }

    StatusCode::NO_CONTENT
}
