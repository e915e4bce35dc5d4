// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the credential lifecycle, the Fitbit client and the
//! HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Persistence failure from a [`crate::db::CredentialStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure exchanging a refresh token.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// Refresh token was rejected (rotated, revoked or expired).
    /// Only a new authorization can recover from this.
    #[error("Refresh token rejected: {0}")]
    InvalidGrant(String),

    /// Network failure, timeout, rate limit or 5xx. Safe to retry later.
    #[error("Transient refresh failure: {0}")]
    Transient(String),

    /// Any other non-success status (usually client misconfiguration).
    #[error("Token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    Malformed(String),
}

/// Failure obtaining a valid access token for a user.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("No credential on file for user {0}")]
    UnknownUser(String),

    #[error("User {0} must re-authorize")]
    ReauthorizationRequired(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Refresh(RefreshError),
}

impl From<RefreshError> for LifecycleError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Transient(msg) => LifecycleError::Transient(msg),
            other => LifecycleError::Refresh(other),
        }
    }
}

/// Failure calling a Fitbit API endpoint other than the token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Access token rejected")]
    Unauthorized,

    #[error("Fitbit rate limit exceeded")]
    RateLimited,

    #[error("Transient provider failure: {0}")]
    Transient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether a bounded retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::RateLimited | ProviderError::Transient(_))
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Fitbit API error: {0}")]
    FitbitApi(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::FitbitApi(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::FitbitApi(msg) => {
                (StatusCode::BAD_GATEWAY, "fitbit_error", Some(msg.clone()))
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
