// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides file-backed SQLite resources, user seeding and HTTP request helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `survey_runtime`

use anyhow::Result;
use axum::body::{to_bytes, Body};
use http::{header, Method, Request, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Once;
use survey_runtime::{
    config::ServerConfig,
    crypto::{PasswordEncoder, Sha256PasswordEncoder},
    database::{NewUser, UserRepository},
    injection::ScopeOutcome,
    models::{Role, User},
    resources::ServerResources,
    server,
};
use tempfile::TempDir;
use tower::ServiceExt;

static INIT_LOGGER: Once = Once::new();

/// Secret used by every test server
pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Server resources over a database file that lives as long as this value
pub struct TestServer {
    pub resources: ServerResources,
    dir: TempDir,
}

impl TestServer {
    /// Fresh axum application sharing this server's registry and routes
    pub fn app(&self) -> axum::Router {
        server::app(
            self.resources.registry.clone(),
            self.resources.router.clone(),
        )
    }

    pub fn database_path(&self) -> std::path::PathBuf {
        self.dir.path().join("survey.db")
    }
}

/// Configuration pointing at `database_path` with the test secret
pub fn test_config(database_path: &std::path::Path) -> Result<ServerConfig> {
    let mut vars = HashMap::new();
    vars.insert(
        "DATABASE_URL".to_owned(),
        format!("sqlite:{}", database_path.display()),
    );
    vars.insert("JWT_SECRET".to_owned(), TEST_JWT_SECRET.to_owned());
    vars.insert("STORAGE_TIMEOUT_SECS".to_owned(), "5".to_owned());
    Ok(ServerConfig::from_lookup(|key| vars.get(key).cloned())?)
}

/// Standard test server setup with an empty, initialized database
pub async fn create_test_server() -> Result<TestServer> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let config = test_config(&dir.path().join("survey.db"))?;
    let resources = ServerResources::new(config).await?;
    Ok(TestServer { resources, dir })
}

/// Insert a user through a committed request context
pub async fn seed_user(
    server: &TestServer,
    username: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    let context = server.resources.registry.context();
    let users = context.resolve::<dyn UserRepository>().await?;
    let user = users
        .create_user(NewUser {
            role,
            name: format!("{username} test"),
            username: username.to_owned(),
            password: Sha256PasswordEncoder.encode(password),
            organization_id: None,
        })
        .await?;
    context.close(ScopeOutcome::Completed).await?;
    Ok(user)
}

/// Send `request` through a fresh application instance
pub async fn send(server: &TestServer, request: Request<Body>) -> Result<Response<Body>> {
    Ok(server.app().oneshot(request).await?)
}

pub fn get(uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())?)
}

pub fn get_with_bearer(uri: &str, token: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?)
}

pub fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    post_raw(uri, &serde_json::to_string(body)?)
}

pub fn post_raw(uri: &str, body: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))?)
}

/// Collect a response body as text
pub async fn body_text(response: Response<Body>) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Collect a response body as JSON
pub async fn body_json(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Assert the status and return the JSON body
pub async fn expect_json(response: Response<Body>, status: StatusCode) -> Result<Value> {
    assert_eq!(response.status(), status);
    body_json(response).await
}
