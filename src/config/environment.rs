// ABOUTME: Environment configuration for the survey server: listener, storage and token settings
// ABOUTME: Parses every variable once at startup and validates it before the server is built
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration

use crate::constants::{defaults, env_vars};
use crate::errors::{AppError, AppResult};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

/// Storage settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:` URL of the database file
    pub url: String,
    /// Delete and re-create the database at startup
    pub prune: bool,
    /// Deadline for a single storage call, in seconds
    pub storage_timeout_secs: u64,
}

/// Token settings
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret; never logged
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub access_expiration_secs: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expiration_secs: i64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("refresh_expiration_secs", &self.refresh_expiration_secs)
            .finish()
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: Environment,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a variable is present but cannot be
    /// parsed, or if a lifetime or timeout is not positive.
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let environment = lookup(env_vars::ENVIRONMENT)
            .map(|value| Environment::from_str_or_default(&value))
            .unwrap_or_default();

        let config = Self {
            environment,
            http: HttpConfig {
                host: lookup(env_vars::HTTP_HOST).unwrap_or_else(|| defaults::HTTP_HOST.to_owned()),
                port: parse_var(&lookup, env_vars::HTTP_PORT, defaults::HTTP_PORT)?,
            },
            database: DatabaseConfig {
                url: lookup(env_vars::DATABASE_URL)
                    .unwrap_or_else(|| defaults::DATABASE_URL.to_owned()),
                prune: lookup(env_vars::DATABASE_PRUNE)
                    .is_some_and(|value| value.eq_ignore_ascii_case("true")),
                storage_timeout_secs: parse_var(
                    &lookup,
                    env_vars::STORAGE_TIMEOUT_SECS,
                    defaults::STORAGE_TIMEOUT_SECS,
                )?,
            },
            auth: AuthConfig {
                jwt_secret: lookup(env_vars::JWT_SECRET)
                    .unwrap_or_else(|| defaults::JWT_SECRET.to_owned()),
                access_expiration_secs: parse_var(
                    &lookup,
                    env_vars::JWT_ACCESS_EXPIRATION,
                    defaults::JWT_ACCESS_EXPIRATION_SECS,
                )?,
                refresh_expiration_secs: parse_var(
                    &lookup,
                    env_vars::JWT_REFRESH_EXPIRATION,
                    defaults::JWT_REFRESH_EXPIRATION_SECS,
                )?,
            },
        };

        config.validate()?;
        if config.auth.jwt_secret == defaults::JWT_SECRET && !config.environment.is_development() {
            warn!(
                environment = %config.environment,
                "JWT_SECRET is not set; tokens are signed with the built-in default secret"
            );
        }
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.auth.access_expiration_secs <= 0 {
            return Err(AppError::config("JWT_ACCESS_EXPIRATION must be positive"));
        }
        if self.auth.refresh_expiration_secs <= 0 {
            return Err(AppError::config("JWT_REFRESH_EXPIRATION must be positive"));
        }
        if self.auth.access_expiration_secs > defaults::MAX_TOKEN_TTL_SECS {
            return Err(AppError::config(format!(
                "JWT_ACCESS_EXPIRATION must not exceed {} seconds",
                defaults::MAX_TOKEN_TTL_SECS
            )));
        }
        if self.auth.refresh_expiration_secs > defaults::MAX_TOKEN_TTL_SECS {
            return Err(AppError::config(format!(
                "JWT_REFRESH_EXPIRATION must not exceed {} seconds",
                defaults::MAX_TOKEN_TTL_SECS
            )));
        }
        if self.database.storage_timeout_secs == 0 {
            return Err(AppError::config("STORAGE_TIMEOUT_SECS must be positive"));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(AppError::config("JWT_SECRET must not be empty"));
        }
        Ok(())
    }

    /// Deadline applied to each storage call
    #[must_use]
    pub const fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.database.storage_timeout_secs)
    }

    /// `host:port` the listener binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Loggable summary; the secret is never included
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Survey Server Configuration:\n\
             - Environment: {}\n\
             - HTTP: {}\n\
             - Database: {} (prune: {})\n\
             - Storage Timeout: {}s\n\
             - Access Token TTL: {}s\n\
             - Refresh Token TTL: {}s\n\
             - JWT Secret: {}",
            self.environment,
            self.bind_address(),
            self.database.url,
            self.database.prune,
            self.database.storage_timeout_secs,
            self.auth.access_expiration_secs,
            self.auth.refresh_expiration_secs,
            if self.auth.jwt_secret == defaults::JWT_SECRET {
                "default"
            } else {
                "configured"
            },
        )
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {key} value '{raw}': {e}"))),
    }
}
