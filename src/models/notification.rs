// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit subscription notification.

use serde::{Deserialize, Serialize};

/// One data-change event from a Fitbit webhook batch. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Fitbit user whose data changed
    pub owner_id: String,
    /// e.g. "activities", "body", "sleep"
    pub collection_type: String,
    /// Day the change applies to (yyyy-MM-dd)
    pub date: String,
    pub subscription_id: String,
    /// Always "user" today
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
}

impl Notification {
    /// Parse a verified webhook body (a JSON array of notifications).
    pub fn parse_batch(raw_body: &[u8]) -> Result<Vec<Notification>, serde_json::Error> {
        serde_json::from_slice(raw_body)
    }
}
