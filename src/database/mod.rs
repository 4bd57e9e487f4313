// ABOUTME: Storage layer: transactional sessions, the SQLite driver and the user repository
// ABOUTME: Every request gets at most one session, bound to and finalized with its context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Storage
//!
//! A [`Session`] wraps one connection opened by the [`Datasource`] and is
//! never pooled or shared. Repositories run their statements through the
//! session of the context they were resolved in, so one request maps to one
//! transaction.

mod session;
mod sqlite;
mod users;

pub use session::{Session, SessionState, StorageConnection};
pub use sqlite::{Datasource, SqliteDatasource, SqliteSession, SqliteStorage};
pub use users::{NewUser, SqliteUserRepository, UserRepository};
