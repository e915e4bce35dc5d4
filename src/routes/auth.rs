// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit OAuth sign-in routes.
//!
//! Thin authorization-code flow: redirect to Fitbit, exchange the code on
//! return, then hand the result to the credential manager and subscribe
//! the user to activity notifications.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::AuthorizedCredentials;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Scopes requested at sign-in.
const SCOPES: &str = "profile activity heartrate location";

/// Collection every signed-in user is subscribed to.
pub const SUBSCRIPTION_COLLECTION: &str = "activities";

/// How long a signed `state` stays acceptable.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/fitbit", get(auth_start))
        .route("/auth/fitbit/callback", get(auth_callback))
}

fn callback_url(config: &Config) -> String {
    format!("{}/auth/fitbit/callback", config.public_url)
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Start OAuth flow - redirect to Fitbit authorization.
async fn auth_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(now_millis()?, &state.config.oauth_state_key)?;

    let auth_url = format!(
        "{}?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}",
        state.config.fitbit_authorize_url,
        urlencoding::encode(&state.config.fitbit_client_id),
        urlencoding::encode(SCOPES),
        urlencoding::encode(&callback_url(&state.config)),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.fitbit_client_id,
        "Starting OAuth flow, redirecting to Fitbit"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth callback - exchange code, store credential, subscribe.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<String> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Fitbit");
        let reason = params.error_description.unwrap_or(error);
        return Ok(format!("Authentication failed due to: {}", reason));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;
    if !verify_state(&oauth_state, &state.config.oauth_state_key, now_millis()?) {
        return Err(AppError::BadRequest(
            "Invalid or expired state parameter".to_string(),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let tokens = state
        .fitbit
        .exchange_code(&code, &callback_url(&state.config))
        .await?;
    let profile = state.fitbit.get_profile(&tokens.access_token).await?;

    let credential = state
        .credentials
        .on_authorized(AuthorizedCredentials {
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: Some(tokens.expires_in),
            profile,
        })
        .await?;

    // Subscription ID = user ID, so notifications name their owner twice.
    state
        .fitbit
        .create_subscription(
            &credential.access_token,
            SUBSCRIPTION_COLLECTION,
            &credential.user_id,
        )
        .await?;

    Ok(format!("Signed in as {}", credential.profile.display_name))
}

/// Build the signed, URL-safe `state` value: "timestamp_hex|signature_hex".
fn sign_state(timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{:x}", timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify the HMAC and age of a `state` value produced by [`sign_state`].
fn verify_state(state: &str, secret: &[u8], now_ms: u128) -> bool {
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
    else {
        return false;
    };

    let Some((timestamp_hex, signature_hex)) = decoded.split_once('|') else {
        return false;
    };

    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(timestamp_hex.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    match u128::from_str_radix(timestamp_hex, 16) {
        Ok(issued) => now_ms.saturating_sub(issued) <= STATE_MAX_AGE_MS,
        Err(_) => false,
    }
}
