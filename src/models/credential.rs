// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user OAuth credential record.

use crate::time_utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile snapshot captured at authorization time. Not authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Fitbit encoded user ID
    pub id: String,
    pub display_name: String,
    pub full_name: String,
}

/// OAuth credential stored for one Fitbit user (document ID = `user_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Fitbit encoded user ID
    pub user_id: String,
    pub access_token: String,
    /// Single use; replaced on every refresh
    pub refresh_token: String,
    /// When the access token expires (RFC3339, UTC)
    #[serde(with = "time_utils::rfc3339")]
    pub access_token_expiry: DateTime<Utc>,
    pub profile: Profile,
}

impl Credential {
    /// Whether the access token must be refreshed before use.
    ///
    /// No skew margin: a token that expires while a downstream call is in
    /// flight will be rejected by Fitbit.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_token_expiry
    }

    /// Copy of this credential carrying a freshly issued token pair.
    pub fn rotated(
        &self,
        access_token: String,
        refresh_token: String,
        access_token_expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: self.user_id.clone(),
            access_token,
            refresh_token,
            access_token_expiry,
            profile: self.profile.clone(),
        }
    }
}

/// Completed authorization-code exchange, as handed over by the sign-in flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedCredentials {
    pub token: String,
    pub refresh_token: String,
    /// Lifetime of `token` in seconds, when the token endpoint reported it
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub profile: Profile,
}
