// ABOUTME: Integration tests for the context-scoped auth service over SQLite
// ABOUTME: Checks credential checks, token claims and refresh against real stored users
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use common::{create_test_server, seed_user, TEST_JWT_SECRET};
use serde_json::json;
use survey_runtime::{
    auth::{AuthService, ACCESS_CONTENT_TYPE, REFRESH_CONTENT_TYPE},
    errors::ErrorCode,
    injection::ScopeOutcome,
    jwt::TokenCodec,
    models::Role,
};

const NOW: i64 = 1_750_000_000;

#[tokio::test]
async fn test_wrong_password_and_unknown_user_return_same_error() -> Result<()> {
    let server = create_test_server().await?;
    seed_user(&server, "alice", "s3cret", Role::Researcher).await?;

    let context = server.resources.registry.context();
    let auth = context.resolve::<AuthService>().await?;
    let wrong_password = auth.authenticate(&context, "alice", "bad").await;
    let unknown_user = auth.authenticate(&context, "nobody", "s3cret").await;
    context.close(ScopeOutcome::Failed).await?;

    let (Err(wrong_password), Err(unknown_user)) = (wrong_password, unknown_user) else {
        anyhow::bail!("authentication unexpectedly succeeded");
    };
    assert_eq!(wrong_password.code, ErrorCode::AuthenticationFailure);
    assert_eq!(wrong_password.code, unknown_user.code);
    assert_eq!(wrong_password.message, unknown_user.message);
    Ok(())
}

#[tokio::test]
async fn test_tokens_carry_subject_and_expiry() -> Result<()> {
    let server = create_test_server().await?;
    let user = seed_user(&server, "alice", "s3cret", Role::OrganizationAdmin).await?;

    let context = server.resources.registry.context();
    let auth = context.resolve::<AuthService>().await?;
    let authenticated = auth.authenticate(&context, "alice", "s3cret").await?;
    let pair = auth.issue_tokens_at(&authenticated, NOW)?;
    context.close(ScopeOutcome::Completed).await?;

    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());
    let access = codec.decode(&pair.access_token)?;
    assert_eq!(access.content_type(), Some(ACCESS_CONTENT_TYPE));
    assert_eq!(access.issued_at(), Some(NOW));
    assert_eq!(access.expiration_time(), Some(NOW + 1800));
    assert_eq!(
        access.subject(),
        Some(&json!({"id": user.id, "role": "ORGANIZATION_ADMIN", "name": "alice test"}))
    );

    let refresh = codec.decode(&pair.refresh_token)?;
    assert_eq!(refresh.content_type(), Some(REFRESH_CONTENT_TYPE));
    assert_eq!(refresh.subject(), Some(&json!(user.id)));
    Ok(())
}

#[tokio::test]
async fn test_access_token_check_opens_no_session() -> Result<()> {
    let server = create_test_server().await?;
    let user = seed_user(&server, "alice", "s3cret", Role::Researcher).await?;

    std::fs::remove_file(server.database_path())?;

    let context = server.resources.registry.context();
    let auth = context.resolve::<AuthService>().await?;
    let pair = auth.issue_tokens(&user)?;
    let subject = auth.subject_from_access_token(&pair.access_token)?;
    context.close(ScopeOutcome::Completed).await?;

    assert_eq!(subject, user.subject());
    // Opening a session would have re-created the file
    assert!(!server.database_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_refresh_for_deleted_user_is_rejected() -> Result<()> {
    let server = create_test_server().await?;
    let alice = seed_user(&server, "alice", "s3cret", Role::Researcher).await?;

    let codec = TokenCodec::new(TEST_JWT_SECRET.as_bytes());
    let mut ghost = alice.clone();
    ghost.id = alice.id + 100;

    let context = server.resources.registry.context();
    let auth = context.resolve::<AuthService>().await?;
    let pair = auth.issue_tokens(&ghost)?;
    let result = auth.refresh(&context, &pair.refresh_token).await;
    context.close(ScopeOutcome::Failed).await?;

    let Err(error) = result else {
        anyhow::bail!("refresh for an unknown user succeeded");
    };
    assert_eq!(error.code, ErrorCode::AuthenticationFailure);
    assert!(codec.decode(&pair.refresh_token).is_ok());
    Ok(())
}
