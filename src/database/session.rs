// ABOUTME: Transactional session wrapping one storage connection for the lifetime of a request
// ABOUTME: Drives the Idle/Dirty/Failed/Closed state machine and bounds storage calls with a deadline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, AppResult};
use crate::injection::{Capability, CapabilityKind, ScopeResource};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Mutation state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No mutation requested yet
    Idle,
    /// A transaction is open and must be committed
    Dirty,
    /// Something went wrong; the transaction must be rolled back
    Failed,
    /// Finalized; the connection has been released
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Dirty => "dirty",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One exclusively owned storage connection
///
/// The session drives the transaction boundary through this seam; driver
/// specific query code receives `&mut Self` inside [`Session::run`] and
/// [`Session::query`].
#[async_trait]
pub trait StorageConnection: Send + 'static {
    /// Open a transaction
    async fn begin(&mut self) -> AppResult<()>;

    /// Commit the open transaction
    async fn commit(&mut self) -> AppResult<()>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> AppResult<()>;

    /// Release the connection; it is not used again
    async fn release(&mut self) -> AppResult<()>;
}

struct SessionInner<C> {
    state: SessionState,
    conn: C,
}

/// Transactional wrapper around one storage connection
///
/// Owned by the context that created it and finalized exactly once when that
/// context closes: committed if it saw a mutation, rolled back if it failed,
/// released in every case.
pub struct Session<C: StorageConnection> {
    id: Uuid,
    deadline: Duration,
    inner: Mutex<SessionInner<C>>,
}

impl<C: StorageConnection> Capability for Session<C> {
    const NAME: &'static str = "Session";
    const KIND: CapabilityKind = CapabilityKind::ContextOnly;
}

async fn bounded<T>(
    deadline: Duration,
    call: impl Future<Output = AppResult<T>> + Send,
) -> AppResult<T> {
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| AppError::storage_timeout(deadline.as_secs()))?
}

impl<C: StorageConnection> Session<C> {
    /// Wrap `conn`; every storage call is cancelled after `deadline`
    #[must_use]
    pub fn new(conn: C, deadline: Duration) -> Self {
        let id = Uuid::new_v4();
        debug!(session.id = %id, "Session opened");
        Self {
            id,
            deadline,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                conn,
            }),
        }
    }

    /// Session id, used in logs
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Run a mutating operation inside the session's transaction
    ///
    /// The first call opens the transaction. Once the session has failed,
    /// further mutations are suppressed and `Ok(None)` is returned without
    /// touching the connection. An operation that fails marks the session
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed, if the transaction cannot
    /// be opened, if the operation fails, or if a call exceeds the deadline.
    pub async fn run<T, F>(&self, operation: F) -> AppResult<Option<T>>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut C) -> BoxFuture<'c, AppResult<T>> + Send,
    {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Closed => return Err(AppError::session_closed()),
            SessionState::Failed => {
                debug!(session.id = %self.id, "Mutation suppressed on failed session");
                return Ok(None);
            }
            SessionState::Idle => {
                if let Err(error) = bounded(self.deadline, inner.conn.begin()).await {
                    inner.state = SessionState::Failed;
                    return Err(error);
                }
                inner.state = SessionState::Dirty;
                debug!(session.id = %self.id, "Transaction started");
            }
            SessionState::Dirty => {}
        }

        let outcome = bounded(self.deadline, operation(&mut inner.conn)).await;
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                inner.state = SessionState::Failed;
                Err(error)
            }
        }
    }

    /// Run a read-only operation; the state is left untouched
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed, if the operation fails, or
    /// if it exceeds the deadline.
    pub async fn query<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut C) -> BoxFuture<'c, AppResult<T>> + Send,
    {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return Err(AppError::session_closed());
        }
        bounded(self.deadline, operation(&mut inner.conn)).await
    }

    /// Finalize the transaction and release the connection
    ///
    /// Commits a dirty session, rolls back a failed one, and only releases an
    /// idle one. Closing a closed session does nothing.
    ///
    /// # Errors
    ///
    /// Returns the commit or rollback error, otherwise the release error. The
    /// session is closed either way.
    pub async fn close(&self) -> AppResult<()> {
        self.finalize(false).await
    }

    /// Mark the session failed, then close it
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback or release fails.
    pub async fn notify_error(&self) -> AppResult<()> {
        self.finalize(true).await
    }

    async fn finalize(&self, failed: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if failed && inner.state != SessionState::Closed {
            inner.state = SessionState::Failed;
        }

        let outcome = match inner.state {
            SessionState::Closed => return Ok(()),
            SessionState::Idle => Ok(()),
            SessionState::Dirty => bounded(self.deadline, inner.conn.commit()).await,
            SessionState::Failed => bounded(self.deadline, inner.conn.rollback()).await,
        };
        let released = bounded(self.deadline, inner.conn.release()).await;

        debug!(session.id = %self.id, from = %inner.state, "Session closed");
        inner.state = SessionState::Closed;
        outcome.and(released)
    }
}

#[async_trait]
impl<C: StorageConnection> ScopeResource for Session<C> {
    async fn close(&self) -> AppResult<()> {
        self.finalize(false).await
    }

    async fn notify_error(&self) -> AppResult<()> {
        self.finalize(true).await
    }
}

impl<C: StorageConnection> Drop for Session<C> {
    fn drop(&mut self) {
        let state = self.inner.get_mut().state;
        if state != SessionState::Closed {
            warn!(
                session.id = %self.id,
                state = %state,
                "Session dropped without being closed; the driver discards the transaction"
            );
        }
    }
}
