// ABOUTME: Integration tests for context-scoped SQLite sessions and their transaction outcome
// ABOUTME: Verifies commit on success, rollback on failure and one shared session per context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use common::{create_test_server, seed_user};
use std::sync::Arc;
use survey_runtime::{
    crypto::{PasswordEncoder, Sha256PasswordEncoder},
    database::{NewUser, SessionState, SqliteSession, UserRepository},
    injection::ScopeOutcome,
    models::Role,
};

fn new_user(username: &str) -> NewUser {
    NewUser {
        role: Role::Researcher,
        name: username.to_owned(),
        username: username.to_owned(),
        password: Sha256PasswordEncoder.encode("pw"),
        organization_id: None,
    }
}

#[tokio::test]
async fn test_completed_context_commits_writes() -> Result<()> {
    let server = create_test_server().await?;
    let user = seed_user(&server, "dora", "pw", Role::Analyst).await?;

    let context = server.resources.registry.context();
    let users = context.resolve::<dyn UserRepository>().await?;
    let stored = users.get_user_by_id(user.id).await?;
    context.close(ScopeOutcome::Completed).await?;

    assert_eq!(stored, Some(user));
    Ok(())
}

#[tokio::test]
async fn test_failed_context_rolls_back_writes() -> Result<()> {
    let server = create_test_server().await?;

    let context = server.resources.registry.context();
    let users = context.resolve::<dyn UserRepository>().await?;
    let created = users.create_user(new_user("eve")).await?;
    context.close(ScopeOutcome::Failed).await?;

    let context = server.resources.registry.context();
    let users = context.resolve::<dyn UserRepository>().await?;
    assert_eq!(users.get_user_by_id(created.id).await?, None);
    context.close(ScopeOutcome::Completed).await?;
    Ok(())
}

#[tokio::test]
async fn test_repositories_share_the_context_session() -> Result<()> {
    let server = create_test_server().await?;
    let context = server.resources.registry.context();

    let first = context.resolve::<SqliteSession>().await?;
    let second = context.resolve::<SqliteSession>().await?;
    assert!(Arc::ptr_eq(&first, &second));

    let users = context.resolve::<dyn UserRepository>().await?;
    let created = users.create_user(new_user("frank")).await?;
    assert_eq!(first.state().await, SessionState::Dirty);

    // Uncommitted write is visible through the same session
    assert!(users.get_user_by_id(created.id).await?.is_some());

    context.close(ScopeOutcome::Completed).await?;
    assert_eq!(first.state().await, SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_read_only_context_stays_idle() -> Result<()> {
    let server = create_test_server().await?;
    let context = server.resources.registry.context();

    let session = context.resolve::<SqliteSession>().await?;
    let users = context.resolve::<dyn UserRepository>().await?;
    assert!(users
        .get_user_by_username_and_password("nobody", "x")
        .await?
        .is_none());
    assert_eq!(session.state().await, SessionState::Idle);

    context.close(ScopeOutcome::Completed).await?;
    assert_eq!(session.state().await, SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_username_fails_the_session() -> Result<()> {
    let server = create_test_server().await?;
    seed_user(&server, "gina", "pw", Role::Researcher).await?;

    let context = server.resources.registry.context();
    let session = context.resolve::<SqliteSession>().await?;
    let users = context.resolve::<dyn UserRepository>().await?;

    assert!(users.create_user(new_user("gina")).await.is_err());
    assert_eq!(session.state().await, SessionState::Failed);

    context.close(ScopeOutcome::Failed).await?;
    Ok(())
}

#[tokio::test]
async fn test_closed_session_rejects_queries() -> Result<()> {
    let server = create_test_server().await?;
    let context = server.resources.registry.context();
    let users = context.resolve::<dyn UserRepository>().await?;
    context.close(ScopeOutcome::Completed).await?;

    assert!(users.get_user_by_id(1).await.is_err());
    Ok(())
}
