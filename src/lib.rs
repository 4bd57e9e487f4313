// ABOUTME: Main library entry point for the survey API runtime
// ABOUTME: Provides request dispatch, context-scoped capabilities, transactional sessions and signed tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// Crate-level attributes:
// - deny(unsafe_code): Zero-tolerance unsafe policy.
#![deny(unsafe_code)]

//! # Survey Runtime
//!
//! HTTP runtime for the survey API. Every request gets its own
//! [`injection::Context`]; capabilities resolved through it share one
//! storage [`database::Session`] that is committed when the handler succeeds
//! and rolled back when it fails.
//!
//! ## Architecture
//!
//! - **Router**: ordered routes matched on method and exact path or pattern
//! - **Injection**: startup registry of singleton and context-scoped providers
//! - **Database**: lazily opened SQLite sessions and the user repository
//! - **Auth**: HS256 access and refresh tokens over the user repository
//! - **Server**: axum front end owning the context lifecycle
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use survey_runtime::config::ServerConfig;
//! use survey_runtime::errors::AppResult;
//! use survey_runtime::resources::ServerResources;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = ServerResources::new(config).await?;
//!     survey_runtime::server::run(resources).await
//! }
//! ```

/// Login, refresh and token verification
pub mod auth;

/// Environment driven configuration
pub mod config;

/// Defaults, environment variable names and route paths
pub mod constants;

/// Password encoding
pub mod crypto;

/// Storage sessions, the SQLite datasource and repositories
pub mod database;

/// Unified error handling
pub mod errors;

/// Capability registry and request contexts
pub mod injection;

/// Signed token model and codec
pub mod jwt;

/// Structured logging setup
pub mod logging;

/// CORS and request tracing
pub mod middleware;

/// Domain models and request bodies
pub mod models;

/// Startup wiring
pub mod resources;

/// Ordered request dispatcher
pub mod router;

/// Application routes
pub mod routes;

/// HTTP server
pub mod server;
