// ABOUTME: Runtime constants: configuration defaults, environment variable names and route paths
// ABOUTME: Kept in one place so configuration, routes and tests agree on the same values
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Constants

/// Defaults applied when the environment does not override a setting
pub mod defaults {
    /// HTTP listen port
    pub const HTTP_PORT: u16 = 8080;
    /// HTTP listen address
    pub const HTTP_HOST: &str = "0.0.0.0";
    /// SQLite database location
    pub const DATABASE_URL: &str = "sqlite:survey.db";
    /// Token signing secret; only acceptable in development
    pub const JWT_SECRET: &str = "SECRET";
    /// Access token lifetime in seconds
    pub const JWT_ACCESS_EXPIRATION_SECS: i64 = 1800;
    /// Refresh token lifetime in seconds
    pub const JWT_REFRESH_EXPIRATION_SECS: i64 = 1800;
    /// Longest accepted token lifetime in seconds (ten years)
    pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;
    /// Deadline for a single storage call in seconds
    pub const STORAGE_TIMEOUT_SECS: u64 = 10;
}

/// Environment variable names
pub mod env_vars {
    pub const HTTP_PORT: &str = "HTTP_PORT";
    pub const HTTP_HOST: &str = "HTTP_HOST";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const DATABASE_PRUNE: &str = "DATABASE_PRUNE";
    pub const JWT_SECRET: &str = "JWT_SECRET";
    pub const JWT_ACCESS_EXPIRATION: &str = "JWT_ACCESS_EXPIRATION";
    pub const JWT_REFRESH_EXPIRATION: &str = "JWT_REFRESH_EXPIRATION";
    pub const STORAGE_TIMEOUT_SECS: &str = "STORAGE_TIMEOUT_SECS";
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
}

/// Paths served by the application routes
pub mod routes {
    /// Login
    pub const AUTH: &str = "/restapi/auth";
    /// Token refresh
    pub const AUTH_REFRESH: &str = "/restapi/auth/refresh";
    /// Subject of the presented access token
    pub const AUTH_ME: &str = "/restapi/auth/me";
    /// Liveness probe
    pub const TEST: &str = "/api/test";
}

/// HTTP header names not covered by the `http` crate
pub mod headers {
    /// Correlation id echoed in logs
    pub const REQUEST_ID: &str = "x-request-id";
}
