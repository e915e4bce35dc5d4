// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential lifecycle: hand out valid access tokens, refreshing them
//! when expired.
//!
//! Fitbit refresh tokens are single use. If two tasks refreshed the same
//! user at once, the loser would present an already-rotated token and get
//! `invalid_grant` back even though the credential is fine. Refreshes are
//! therefore serialized per user and the staleness check is repeated once
//! the lock is held.

use crate::db::CredentialStore;
use crate::error::{LifecycleError, RefreshError, StoreError};
use crate::models::{AuthorizedCredentials, Credential};
use crate::services::refresh::TokenRefresher;
use crate::services::refresh_locks::RefreshLocks;
use crate::time_utils::{expiry_after, format_utc_rfc3339};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;

/// Public accessor for per-user credentials.
#[derive(Clone)]
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            refresh_locks: RefreshLocks::new(),
        }
    }

    /// Lock registry (exposed for inspection).
    pub fn refresh_locks(&self) -> &RefreshLocks {
        &self.refresh_locks
    }

    /// Get a currently valid access token for `user_id`.
    ///
    /// 1. Read the credential; a fresh token is returned without locking
    /// 2. Acquire the user's refresh lock
    /// 3. Re-read: another task may have refreshed while we waited
    /// 4. Refresh, persist, return the new token
    ///
    /// A rejected refresh token is not retried; the user has to sign in again.
    pub async fn get_valid_token(&self, user_id: &str) -> Result<String, LifecycleError> {
        let credential = self.load(user_id).await?;
        if !credential.is_stale(Utc::now()) {
            return Ok(credential.access_token);
        }

        let _guard = self.refresh_locks.acquire(user_id).await;

        let credential = self.load(user_id).await?;
        if !credential.is_stale(Utc::now()) {
            tracing::debug!(user_id, "Token already refreshed by another task");
            return Ok(credential.access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refreshed = match self.refresher.refresh(&credential).await {
            Ok(c) => c,
            Err(RefreshError::InvalidGrant(reason)) => {
                return self.recover_rejected_grant(&credential, &reason).await;
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed");
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.upsert(&refreshed).await {
            // The old refresh token is already spent at Fitbit.
            tracing::error!(
                user_id,
                error = %e,
                "Refreshed credential could not be persisted"
            );
            return Err(e.into());
        }

        tracing::info!(
            user_id,
            expires_at = %format_utc_rfc3339(refreshed.access_token_expiry),
            "Token refreshed"
        );
        Ok(refreshed.access_token)
    }

    /// Persist the credential produced by a completed authorization.
    ///
    /// Replaces any credential already on file for the user.
    pub async fn on_authorized(
        &self,
        authorized: AuthorizedCredentials,
    ) -> Result<Credential, StoreError> {
        let access_token_expiry = initial_expiry(&authorized.token, authorized.expires_in);

        let credential = Credential {
            user_id: authorized.profile.id.clone(),
            access_token: authorized.token,
            refresh_token: authorized.refresh_token,
            access_token_expiry,
            profile: authorized.profile,
        };

        // Keep an in-flight refresh from overwriting the new pair.
        let _guard = self.refresh_locks.acquire(&credential.user_id).await;
        self.store.upsert(&credential).await?;

        tracing::info!(
            user_id = %credential.user_id,
            display_name = %credential.profile.display_name,
            expires_at = %format_utc_rfc3339(access_token_expiry),
            "Credential stored after authorization"
        );
        Ok(credential)
    }

    async fn load(&self, user_id: &str) -> Result<Credential, LifecycleError> {
        self.store
            .get(user_id)
            .await?
            .ok_or_else(|| LifecycleError::UnknownUser(user_id.to_string()))
    }

    /// Handle `invalid_grant` for the refresh token in `spent`.
    ///
    /// Another process sharing the store may have rotated the token first;
    /// in that case the store now holds a newer, valid pair.
    async fn recover_rejected_grant(
        &self,
        spent: &Credential,
        reason: &str,
    ) -> Result<String, LifecycleError> {
        let user_id = spent.user_id.as_str();

        if let Some(current) = self.store.get(user_id).await? {
            if current.refresh_token != spent.refresh_token && !current.is_stale(Utc::now()) {
                tracing::info!(
                    user_id,
                    "Refresh token rotated by another process, using stored token"
                );
                return Ok(current.access_token);
            }
        }

        tracing::warn!(user_id, reason, "Refresh token rejected, re-authorization required");
        Err(LifecycleError::ReauthorizationRequired(user_id.to_string()))
    }
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Expiry of an access token handed over by the sign-in flow.
///
/// Prefers the lifetime reported by the token endpoint. Falls back to the
/// `exp` claim when the token is a JWT (Fitbit's are), and otherwise treats
/// the token as already expired so the first use refreshes it.
pub fn initial_expiry(access_token: &str, expires_in: Option<i64>) -> DateTime<Utc> {
    if let Some(secs) = expires_in {
        match expiry_after(secs) {
            Some(expiry) => return expiry,
            None => tracing::warn!(expires_in = secs, "Token lifetime out of range, ignoring"),
        }
    }

    match decode_exp_claim(access_token) {
        Some(exp) => DateTime::from_timestamp(exp, 0).unwrap_or_else(Utc::now),
        None => {
            tracing::warn!("Access token expiry unknown, marking stale");
            Utc::now()
        }
    }
}

/// Read `exp` from an unverified JWT. The signature is Fitbit's business.
fn decode_exp_claim(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| data.claims.exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct FitbitLikeClaims {
        aud: String,
        sub: String,
        exp: i64,
        iat: i64,
    }

    fn fitbit_like_token(exp: i64) -> String {
        let claims = FitbitLikeClaims {
            aud: "23ABCD".to_string(),
            sub: "u1".to_string(),
            exp,
            iat: exp - 28800,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"fitbit-internal-key"),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_expiry_prefers_expires_in() {
        let token = fitbit_like_token(1);
        let expiry = initial_expiry(&token, Some(3600));
        assert!(expiry > Utc::now() + Duration::seconds(3590));
    }

    #[test]
    fn test_initial_expiry_decodes_jwt_exp() {
        let exp = (Utc::now() + Duration::hours(8)).timestamp();
        let expiry = initial_expiry(&fitbit_like_token(exp), None);
        assert_eq!(expiry.timestamp(), exp);
    }

    #[test]
    fn test_initial_expiry_out_of_range_lifetime_falls_back() {
        let exp = (Utc::now() + Duration::hours(8)).timestamp();
        let expiry = initial_expiry(&fitbit_like_token(exp), Some(9_000_000_000_000));
        assert_eq!(expiry.timestamp(), exp);

        let expiry = initial_expiry("not-a-jwt", Some(i64::MAX));
        assert!(expiry <= Utc::now());
    }

    #[test]
    fn test_initial_expiry_opaque_token_is_stale() {
        let expiry = initial_expiry("not-a-jwt", None);
        assert!(expiry <= Utc::now());
    }
}
