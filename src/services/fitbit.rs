// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client.
//!
//! Handles:
//! - Refresh token exchange (single-use rotation)
//! - Authorization code exchange for the sign-in flow
//! - Profile fetch
//! - Subscription creation for newly authorized users
//!
//! Every call goes through one `reqwest::Client` with a bounded timeout.

use crate::config::Config;
use crate::error::{ProviderError, RefreshError};
use crate::models::Profile;
use reqwest::StatusCode;
use serde::Deserialize;

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl FitbitClient {
    /// Create a client from the application configuration.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: config.fitbit_api_url.trim_end_matches('/').to_string(),
            token_url: config.fitbit_token_url.clone(),
            client_id: config.fitbit_client_id.clone(),
            client_secret: config.fitbit_client_secret.clone(),
        })
    }

    /// Exchange a refresh token for a new access/refresh token pair.
    ///
    /// POST {token_url}
    /// Authorization: Basic base64(client_id:client_secret)
    /// grant_type=refresh_token&refresh_token=...
    ///
    /// On success the refresh token that was sent is no longer valid.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RefreshError::Transient("Token refresh timed out".to_string())
                } else {
                    RefreshError::Transient(format!("Token refresh request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| RefreshError::Malformed(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_refresh_failure(status, body))
    }

    /// Exchange an authorization code for tokens (sign-in callback).
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ProviderError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    /// Get the authorized user's profile.
    pub async fn get_profile(&self, access_token: &str) -> Result<Profile, ProviderError> {
        let url = format!("{}/1/user/-/profile.json", self.api_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let profile: ProfileResponse = self.check_response_json(response).await?;
        Ok(profile.user.into())
    }

    /// Subscribe to change notifications for the authorized user.
    ///
    /// An empty `collection` subscribes to all collections. Fitbit answers
    /// 201 for a new subscription and 200 when it already exists.
    pub async fn create_subscription(
        &self,
        access_token: &str,
        collection: &str,
        subscription_id: &str,
    ) -> Result<(), ProviderError> {
        let url = if collection.is_empty() {
            format!(
                "{}/1/user/-/apiSubscriptions/{}.json",
                self.api_url,
                urlencoding::encode(subscription_id)
            )
        } else {
            format!(
                "{}/1/user/-/{}/apiSubscriptions/{}.json",
                self.api_url,
                collection,
                urlencoding::encode(subscription_id)
            )
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response(response).await?;
        tracing::info!(subscription_id, collection, "Fitbit subscription active");
        Ok(())
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), ProviderError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, body))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("JSON parse error: {}", e)))
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Transient("Request timed out".to_string())
    } else {
        ProviderError::Transient(e.to_string())
    }
}

fn classify_failure(status: StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 => ProviderError::Unauthorized,
        429 => {
            tracing::warn!("Fitbit rate limit hit (429)");
            ProviderError::RateLimited
        }
        500..=599 => ProviderError::Transient(format!("HTTP {}", status)),
        code => ProviderError::Status { status: code, body },
    }
}

/// Error types Fitbit reports for a refresh token that can no longer be used.
const REJECTED_GRANT_ERRORS: [&str; 3] = ["invalid_grant", "invalid_token", "expired_token"];

fn classify_refresh_failure(status: StatusCode, body: String) -> RefreshError {
    match status.as_u16() {
        400 | 401 if REJECTED_GRANT_ERRORS.iter().any(|e| body.contains(e)) => {
            RefreshError::InvalidGrant(body)
        }
        429 => {
            tracing::warn!("Fitbit rate limit hit on token refresh (429)");
            RefreshError::Transient("HTTP 429".to_string())
        }
        500..=599 => RefreshError::Transient(format!("HTTP {}", status)),
        code => RefreshError::Rejected { status: code, body },
    }
}

/// Token endpoint response (refresh and authorization code grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: FitbitUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitUser {
    encoded_id: String,
    display_name: String,
    #[serde(default)]
    full_name: String,
}

impl From<FitbitUser> for Profile {
    fn from(user: FitbitUser) -> Self {
        Profile {
            id: user.encoded_id,
            display_name: user.display_name,
            full_name: user.full_name,
        }
    }
}
