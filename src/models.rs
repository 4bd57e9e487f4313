// ABOUTME: Domain models shared with survey-core plus the request bodies of the auth endpoints
// ABOUTME: Request bodies use the camelCase field names clients send
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub use survey_core::models::*;

use serde::{Deserialize, Serialize};

/// Body of `POST /restapi/auth`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login name
    pub username: String,
    /// Plaintext password
    pub password: String,
}

/// Body of `POST /restapi/auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token from a previous login
    pub refresh_token: String,
}
