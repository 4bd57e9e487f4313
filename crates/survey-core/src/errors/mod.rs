// ABOUTME: Unified error type and error codes shared by every survey runtime module
// ABOUTME: Maps each error code onto an HTTP status and renders client-safe error bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling
//!
//! Every fallible operation in the runtime returns [`AppResult`]. The
//! [`ErrorCode`] carried by an [`AppError`] decides the HTTP status used when
//! the error escapes a request handler:
//!
//! - routing and body decoding failures are client errors (404 / 400)
//! - authentication failures are 401, without saying which check failed
//! - container misconfiguration, storage failures and anything unclassified
//!   are 500, and the real message stays in the server log

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "http-response")]
mod http_response;

/// Message sent to clients in place of the real cause of a server error
pub const GENERIC_SERVER_ERROR: &str = "Something went wrong";

/// Standard error codes used throughout the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request handling
    /// No registered route matched the method and path
    RouteNotFound,
    /// The request body could not be decoded into the expected shape
    MalformedBody,
    /// The request body exceeded the size read before dispatch
    PayloadTooLarge,
    /// Bad credentials or an invalid, expired or unverifiable token
    AuthenticationFailure,

    // Container misconfiguration
    /// A scoped factory re-entered the resolution of its own capability
    ConstructionCycle,
    /// A second factory was registered for the same capability
    DuplicateProvider,
    /// No factory is registered for the requested capability
    MissingProvider,
    /// The capability is not eligible for the requested registration
    InvalidCapability,
    /// A context-only capability was requested outside of a context
    ContextOnly,

    // Storage
    /// The session was used after it had been closed
    SessionClosed,
    /// A storage call exceeded its deadline and was cancelled
    StorageTimeout,
    /// The storage driver reported a failure
    DatabaseError,

    // Transport
    /// The client went away before the exchange completed
    ClientAborted,

    // Internal
    /// Startup configuration is missing or invalid
    ConfigError,
    /// Any failure without a more specific classification
    InternalError,
}

impl ErrorCode {
    /// HTTP status code used when this error ends a request
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::MalformedBody => 400,
            Self::AuthenticationFailure => 401,
            Self::RouteNotFound => 404,
            Self::PayloadTooLarge => 413,
            // nginx's "client closed request"; never delivered, kept distinct from 500
            Self::ClientAborted => 499,
            Self::ConstructionCycle
            | Self::DuplicateProvider
            | Self::MissingProvider
            | Self::InvalidCapability
            | Self::ContextOnly
            | Self::SessionClosed
            | Self::StorageTimeout
            | Self::DatabaseError
            | Self::ConfigError
            | Self::InternalError => 500,
        }
    }

    /// Whether this code describes a server-side failure whose details stay private
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        self.http_status() >= 500 && self.http_status() < 600
    }

    /// Short human readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::RouteNotFound => "Not found",
            Self::MalformedBody => "Bad request",
            Self::PayloadTooLarge => "Payload too large",
            Self::AuthenticationFailure => "Unauthorized",
            Self::ConstructionCycle => "Capability construction cycle",
            Self::DuplicateProvider => "Duplicate capability provider",
            Self::MissingProvider => "Missing capability provider",
            Self::InvalidCapability => "Invalid capability for provider",
            Self::ContextOnly => "Capability is only available inside a context",
            Self::SessionClosed => "Session already closed",
            Self::StorageTimeout => "Storage call timed out",
            Self::DatabaseError => "Database operation failed",
            Self::ClientAborted => "Client aborted the connection",
            Self::ConfigError => "Configuration error",
            Self::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Unified error type for the runtime
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new error with the given code and message
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Message that is safe to show to the client
    #[must_use]
    pub fn client_message(&self) -> &str {
        if self.code.is_server_error() {
            GENERIC_SERVER_ERROR
        } else {
            &self.message
        }
    }

    /// No route matched the request
    #[must_use]
    pub fn route_not_found() -> Self {
        Self::new(ErrorCode::RouteNotFound, "Didn't match with any path")
    }

    /// Request body could not be decoded
    #[must_use]
    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedBody, message)
    }

    /// Request body is larger than the server reads
    #[must_use]
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    /// Authentication failed
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationFailure, message)
    }

    /// A capability factory re-entered its own resolution
    #[must_use]
    pub fn construction_cycle(capability: &str) -> Self {
        Self::new(
            ErrorCode::ConstructionCycle,
            format!("{capability} is already being constructed in this context"),
        )
    }

    /// A factory already exists for the capability
    #[must_use]
    pub fn duplicate_provider(capability: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateProvider,
            format!("A provider for {capability} is already registered"),
        )
    }

    /// No factory exists for the capability
    #[must_use]
    pub fn missing_provider(capability: &str) -> Self {
        Self::new(
            ErrorCode::MissingProvider,
            format!("There aren't providers for {capability}"),
        )
    }

    /// The capability cannot take this kind of provider
    #[must_use]
    pub fn invalid_capability(capability: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidCapability,
            format!("{capability} cannot be registered: {reason}"),
        )
    }

    /// The capability must be resolved through a context
    #[must_use]
    pub fn context_only(capability: &str) -> Self {
        Self::new(
            ErrorCode::ContextOnly,
            format!("{capability} should only be resolved in a context"),
        )
    }

    /// The session was already closed
    #[must_use]
    pub fn session_closed() -> Self {
        Self::new(ErrorCode::SessionClosed, "Session is already closed")
    }

    /// A storage call hit its deadline
    #[must_use]
    pub fn storage_timeout(seconds: u64) -> Self {
        Self::new(
            ErrorCode::StorageTimeout,
            format!("Storage call timed out after {seconds}s"),
        )
    }

    /// Database error
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// The client disconnected mid-exchange
    #[must_use]
    pub fn client_aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ClientAborted, message)
    }

    /// Configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Internal server error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorResponseDetails,
}

/// Body of an [`ErrorResponse`]
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Machine readable code
    pub code: ErrorCode,
    /// Client-safe message
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.client_message().to_owned(),
            },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed_body("Wrong JSON format.").with_source(error)
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(error: base64::DecodeError) -> Self {
        Self::authentication("Invalid token encoding").with_source(error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string()).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::RouteNotFound.http_status(), 404);
        assert_eq!(ErrorCode::MalformedBody.http_status(), 400);
        assert_eq!(ErrorCode::AuthenticationFailure.http_status(), 401);
        assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
        assert!(!ErrorCode::PayloadTooLarge.is_server_error());
        assert_eq!(ErrorCode::ConstructionCycle.http_status(), 500);
        assert_eq!(ErrorCode::MissingProvider.http_status(), 500);
        assert_ne!(ErrorCode::ClientAborted.http_status(), 500);
    }

    #[test]
    fn test_server_errors_hide_their_message() {
        let error = AppError::database("no such table: USER");
        assert_eq!(error.client_message(), GENERIC_SERVER_ERROR);

        let error = AppError::authentication("Wrong credentials");
        assert_eq!(error.client_message(), "Wrong credentials");
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::internal("secret detail");
        let json = serde_json::to_string(&ErrorResponse::from(&error)).unwrap();
        assert!(json.contains("INTERNAL_ERROR"));
        assert!(!json.contains("secret detail"));
    }
}
