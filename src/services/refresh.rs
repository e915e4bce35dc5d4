// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh-token exchange.

use crate::error::RefreshError;
use crate::models::Credential;
use crate::services::fitbit::FitbitClient;
use crate::time_utils::expiry_after;
use async_trait::async_trait;

/// Turns a stale credential into a freshly issued one.
///
/// Implementations make exactly one call to the token endpoint and never
/// write to the store; persisting the result is the caller's job.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, RefreshError>;
}

#[async_trait]
impl TokenRefresher for FitbitClient {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, RefreshError> {
        let tokens = self.refresh_token(&credential.refresh_token).await?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(RefreshError::Malformed(
                "token response without access or refresh token".to_string(),
            ));
        }

        let expiry = expiry_after(tokens.expires_in).ok_or_else(|| {
            RefreshError::Malformed(format!("expires_in out of range: {}", tokens.expires_in))
        })?;

        Ok(credential.rotated(tokens.access_token, tokens.refresh_token, expiry))
    }
}
