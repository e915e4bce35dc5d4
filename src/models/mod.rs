// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod notification;

pub use credential::{AuthorizedCredentials, Credential, Profile};
pub use notification::Notification;
