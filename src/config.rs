// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which credential store backend to open at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON document under `DATA_DIR`.
    File,
    /// Google Cloud Firestore (or its emulator).
    Firestore,
    /// Process memory only. Nothing survives a restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Fitbit OAuth client ID (public)
    pub fitbit_client_id: String,
    /// Externally reachable base URL, used for the OAuth redirect URI
    pub public_url: String,
    /// Server port
    pub port: u16,
    /// Credential store backend
    pub store_backend: StoreBackend,
    /// Directory for the file store
    pub data_dir: PathBuf,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// Fitbit Web API base URL
    pub fitbit_api_url: String,
    /// Fitbit OAuth token endpoint
    pub fitbit_token_url: String,
    /// Fitbit OAuth authorize endpoint
    pub fitbit_authorize_url: String,
    /// Timeout applied to every outbound Fitbit call
    pub http_timeout: Duration,
    /// Attempts per notification for transient downstream failures
    pub dispatch_max_attempts: u32,
    /// Pause between downstream attempts
    pub dispatch_retry_backoff: Duration,

    // --- Secrets ---
    /// Fitbit OAuth client secret, also the webhook signing secret
    pub fitbit_client_secret: String,
    /// Key for signing the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Code Fitbit sends to verify the subscriber endpoint
    pub subscriber_verify_code: Option<String>,
}

impl Config {
    /// Config for testing only.
    pub fn test_default() -> Self {
        Self {
            fitbit_client_id: "test_client_id".to_string(),
            public_url: "http://localhost:8080".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            data_dir: PathBuf::from("./data"),
            gcp_project_id: "test-project".to_string(),
            fitbit_api_url: "http://127.0.0.1:9".to_string(),
            fitbit_token_url: "http://127.0.0.1:9/oauth2/token".to_string(),
            fitbit_authorize_url: "http://127.0.0.1:9/oauth2/authorize".to_string(),
            http_timeout: Duration::from_secs(2),
            dispatch_max_attempts: 2,
            dispatch_retry_backoff: Duration::from_millis(10),
            fitbit_client_secret: "test_secret".to_string(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            subscriber_verify_code: Some("test_verify_code".to_string()),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            fitbit_client_id: required("FITBIT_CLIENT_ID")?,
            public_url: env::var("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            port: parsed("PORT", 8080)?,
            store_backend: match env::var("STORE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => StoreBackend::File,
            },
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            fitbit_api_url: env::var("FITBIT_API_URL")
                .unwrap_or_else(|_| "https://api.fitbit.com".to_string()),
            fitbit_token_url: env::var("FITBIT_TOKEN_URL")
                .unwrap_or_else(|_| "https://api.fitbit.com/oauth2/token".to_string()),
            fitbit_authorize_url: env::var("FITBIT_AUTHORIZE_URL")
                .unwrap_or_else(|_| "https://www.fitbit.com/oauth2/authorize".to_string()),
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 10)?),
            dispatch_max_attempts: parsed::<u32>("DISPATCH_MAX_ATTEMPTS", 3)?.max(1),
            dispatch_retry_backoff: Duration::from_millis(parsed("DISPATCH_RETRY_BACKOFF_MS", 500)?),

            fitbit_client_secret: required("FITBIT_CLIENT_SECRET")?,
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
            subscriber_verify_code: env::var("FITBIT_SUBSCRIBER_VERIFY_CODE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("FITBIT_CLIENT_ID", "test_id");
        env::set_var("FITBIT_CLIENT_SECRET", " test_secret\n");
        env::set_var("OAUTH_STATE_KEY", "test_state_key_32_bytes_minimum!");
        env::set_var("STORE_BACKEND", "memory");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.fitbit_client_id, "test_id");
        assert_eq!(config.fitbit_client_secret, "test_secret");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.dispatch_max_attempts >= 1);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Firestore".parse::<StoreBackend>().unwrap(), StoreBackend::Firestore);
        assert_eq!(" file ".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert!(matches!(
            "nedb".parse::<StoreBackend>(),
            Err(ConfigError::Invalid("STORE_BACKEND", _))
        ));
    }
}
