// ABOUTME: SQLite storage driver with one owned connection per session and no pooling
// ABOUTME: Provides the process-wide datasource that initializes the schema and opens sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::session::{Session, StorageConnection};
use crate::errors::{AppError, AppResult};
use crate::injection::Capability;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Session over a SQLite connection
pub type SqliteSession = Session<SqliteStorage>;

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS ORGANIZATION (
        organization_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS USER (
        user_id INTEGER PRIMARY KEY AUTOINCREMENT,
        role INTEGER NOT NULL,
        name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        organization_id INTEGER REFERENCES ORGANIZATION(organization_id)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_user_credentials ON USER(username, password)",
];

/// One SQLite connection owned by a single session
pub struct SqliteStorage {
    conn: Option<SqliteConnection>,
    in_transaction: bool,
}

impl SqliteStorage {
    /// Wrap an open connection
    #[must_use]
    pub const fn new(conn: SqliteConnection) -> Self {
        Self {
            conn: Some(conn),
            in_transaction: false,
        }
    }

    /// The live connection, for query code running inside a session
    ///
    /// # Errors
    ///
    /// Returns an error once the connection has been released.
    pub fn connection(&mut self) -> AppResult<&mut SqliteConnection> {
        self.conn.as_mut().ok_or_else(AppError::session_closed)
    }

    async fn execute(&mut self, statement: &'static str) -> AppResult<()> {
        sqlx::query(statement).execute(self.connection()?).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageConnection for SqliteStorage {
    async fn begin(&mut self) -> AppResult<()> {
        self.execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.execute("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.execute("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn release(&mut self) -> AppResult<()> {
        match self.conn.take() {
            Some(conn) => Ok(conn.close().await?),
            None => Ok(()),
        }
    }
}

/// Source of storage sessions
#[async_trait]
pub trait Datasource: Send + Sync {
    /// Prepare the storage (schema creation, pruning)
    async fn init(&self) -> AppResult<()>;

    /// Open a new session over a fresh connection
    async fn create_session(&self) -> AppResult<SqliteSession>;
}

impl Capability for dyn Datasource {
    const NAME: &'static str = "Datasource";
}

/// File-backed SQLite datasource
pub struct SqliteDatasource {
    options: SqliteConnectOptions,
    prune: bool,
    storage_timeout: Duration,
}

impl SqliteDatasource {
    /// Create a datasource for `database_url`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot be parsed or points to
    /// an in-memory database, which would not survive across the per-session
    /// connections.
    pub fn new(database_url: &str, prune: bool, storage_timeout: Duration) -> AppResult<Self> {
        if database_url.contains(":memory:") || database_url.contains("mode=memory") {
            return Err(AppError::config(
                "In-memory SQLite databases are not supported; every session opens its own connection",
            ));
        }
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true);
        Ok(Self {
            options,
            prune,
            storage_timeout,
        })
    }

    /// Database file on disk
    #[must_use]
    pub fn path(&self) -> &Path {
        self.options.get_filename()
    }

    async fn connect(&self) -> AppResult<SqliteConnection> {
        tokio::time::timeout(self.storage_timeout, self.options.connect())
            .await
            .map_err(|_| AppError::storage_timeout(self.storage_timeout.as_secs()))?
            .map_err(AppError::from)
    }

    async fn run_init_script(&self) -> AppResult<()> {
        info!(path = %self.path().display(), "Executing init script");
        let mut conn = self.connect().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut conn).await?;
        }
        conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Datasource for SqliteDatasource {
    async fn init(&self) -> AppResult<()> {
        let path: PathBuf = self.path().to_path_buf();
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::database(format!("Cannot inspect {}: {e}", path.display())))?;

        if !exists {
            return self.run_init_script().await;
        }
        if self.prune {
            info!(path = %path.display(), "Pruning database");
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::database(format!("Cannot remove {}: {e}", path.display())))?;
            return self.run_init_script().await;
        }
        debug!(path = %path.display(), "Database already initialized");
        Ok(())
    }

    async fn create_session(&self) -> AppResult<SqliteSession> {
        let conn = self.connect().await?;
        Ok(Session::new(SqliteStorage::new(conn), self.storage_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_in_memory_database_is_rejected() {
        for url in ["sqlite::memory:", "sqlite://file?mode=memory"] {
            let error = SqliteDatasource::new(url, false, Duration::from_secs(1))
                .err()
                .unwrap();
            assert_eq!(error.code, ErrorCode::ConfigError);
        }
    }

    #[test]
    fn test_path_is_taken_from_url() {
        let datasource =
            SqliteDatasource::new("sqlite:data/survey.db", false, Duration::from_secs(1)).unwrap();
        assert_eq!(datasource.path(), Path::new("data/survey.db"));
    }
}
