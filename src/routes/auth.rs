// ABOUTME: Authentication route handlers for login, token refresh and subject lookup
// ABOUTME: Resolves the auth service through the request context and maps failures to 401
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Authentication routes
//!
//! Any authentication failure is answered with a fixed message per endpoint
//! so clients cannot tell which check failed. Storage and container errors
//! pass through unchanged and become 500s.

use crate::auth::AuthService;
use crate::constants::routes;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{LoginRequest, RefreshRequest};
use crate::router::{Reply, RequestHandle, Router};

/// Authentication routes implementation
pub struct AuthRoutes;

impl AuthRoutes {
    /// Register the authentication routes
    pub fn register(router: &mut Router) {
        router
            .post(routes::AUTH, login_handler)
            .post(routes::AUTH_REFRESH, refresh_handler)
            .get(routes::AUTH_ME, me_handler);
    }
}

fn rewrite_auth_failure(error: AppError, message: &str) -> AppError {
    if error.code == ErrorCode::AuthenticationFailure {
        AppError::authentication(message)
    } else {
        error
    }
}

async fn login_handler(request: RequestHandle, details: LoginRequest) -> AppResult<Reply> {
    let context = request.context();
    let auth = context.resolve::<AuthService>().await?;
    let user = auth
        .authenticate(context, &details.username, &details.password)
        .await
        .map_err(|e| rewrite_auth_failure(e, "Wrong credentials"))?;
    Reply::json(&auth.issue_tokens(&user)?)
}

async fn refresh_handler(request: RequestHandle, details: RefreshRequest) -> AppResult<Reply> {
    let context = request.context();
    let auth = context.resolve::<AuthService>().await?;
    let tokens = auth
        .refresh(context, &details.refresh_token)
        .await
        .map_err(|e| rewrite_auth_failure(e, "Invalid refresh"))?;
    Reply::json(&tokens)
}

async fn me_handler(request: RequestHandle) -> AppResult<Reply> {
    let token = request
        .bearer_token()
        .ok_or_else(|| AppError::authentication("Missing bearer token"))?;
    let auth = request.context().resolve::<AuthService>().await?;
    let subject = auth
        .subject_from_access_token(token)
        .map_err(|e| rewrite_auth_failure(e, "Invalid access token"))?;
    Reply::json(&subject)
}
