// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod dispatcher;
pub mod fitbit;
pub mod refresh;
pub mod refresh_locks;
pub mod signature;

pub use credentials::CredentialManager;
pub use dispatcher::{DispatchSummary, Dispatcher, NotificationHandler, ProfileFetchHandler};
pub use fitbit::FitbitClient;
pub use refresh::TokenRefresher;
pub use refresh_locks::RefreshLocks;
