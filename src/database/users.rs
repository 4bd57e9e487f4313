// ABOUTME: Credential store contract and its SQLite implementation over the request session
// ABOUTME: Looks users up by encoded credentials or id and creates accounts inside the transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::sqlite::{SqliteSession, SqliteStorage};
use crate::errors::{AppError, AppResult};
use crate::injection::Capability;
use crate::models::{Role, User};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

const USER_COLUMNS: &str = "user_id, role, name, username, password, organization_id";

/// Account to be inserted; `password` is already encoded
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Account role
    pub role: Role,
    /// Display name
    pub name: String,
    /// Login name
    pub username: String,
    /// Encoded password
    pub password: String,
    /// Owning organization
    pub organization_id: Option<i64>,
}

/// Credential lookup used by authentication
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find the user whose username and encoded password both match
    async fn get_user_by_username_and_password(
        &self,
        username: &str,
        encoded_password: &str,
    ) -> AppResult<Option<User>>;

    /// Find a user by primary key
    async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>>;

    /// Insert an account and return it with its assigned id
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
}

impl Capability for dyn UserRepository {
    const NAME: &'static str = "UserRepository";
}

fn user_from_row(row: &SqliteRow) -> AppResult<User> {
    let code: i64 = row.try_get("role")?;
    let role = Role::from_code(code)
        .ok_or_else(|| AppError::database(format!("Unknown role code {code} in USER table")))?;
    Ok(User {
        id: row.try_get("user_id")?,
        role,
        name: row.try_get("name")?,
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        organization_id: row.try_get("organization_id")?,
    })
}

/// [`UserRepository`] reading through the request's SQLite session
pub struct SqliteUserRepository {
    session: Arc<SqliteSession>,
}

impl SqliteUserRepository {
    /// Bind the repository to one session
    #[must_use]
    pub const fn new(session: Arc<SqliteSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn get_user_by_username_and_password(
        &self,
        username: &str,
        encoded_password: &str,
    ) -> AppResult<Option<User>> {
        let username = username.to_owned();
        let encoded_password = encoded_password.to_owned();
        self.session
            .query(move |storage: &mut SqliteStorage| {
                Box::pin(async move {
                    let sql = format!(
                        "SELECT {USER_COLUMNS} FROM USER WHERE username = ? AND password = ? LIMIT 1"
                    );
                    let row = sqlx::query(&sql)
                        .bind(username)
                        .bind(encoded_password)
                        .fetch_optional(storage.connection()?)
                        .await?;
                    row.as_ref().map(user_from_row).transpose()
                })
            })
            .await
    }

    async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        self.session
            .query(move |storage: &mut SqliteStorage| {
                Box::pin(async move {
                    let sql = format!("SELECT {USER_COLUMNS} FROM USER WHERE user_id = ?");
                    let row = sqlx::query(&sql)
                        .bind(id)
                        .fetch_optional(storage.connection()?)
                        .await?;
                    row.as_ref().map(user_from_row).transpose()
                })
            })
            .await
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let row = user.clone();
        let id = self
            .session
            .run(move |storage: &mut SqliteStorage| {
                Box::pin(async move {
                    let result = sqlx::query(
                        "INSERT INTO USER (role, name, username, password, organization_id) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(row.role.code())
                    .bind(row.name)
                    .bind(row.username)
                    .bind(row.password)
                    .bind(row.organization_id)
                    .execute(storage.connection()?)
                    .await?;
                    Ok(result.last_insert_rowid())
                })
            })
            .await?
            .ok_or_else(|| {
                AppError::database("User not created: the session already failed")
            })?;

        Ok(User {
            id,
            role: user.role,
            name: user.name,
            username: user.username,
            password: user.password,
            organization_id: user.organization_id,
        })
    }
}
