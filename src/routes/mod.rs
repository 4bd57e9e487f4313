// ABOUTME: Route module organization for the survey server HTTP endpoints
// ABOUTME: Registers every application route on the dispatcher in a fixed order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Application routes
//!
//! Each domain module owns a `register` function; [`application_router`]
//! calls them in order. Registration order matters: the dispatcher picks the
//! first matching route.

/// Login, refresh and subject lookup
pub mod auth;
/// Liveness endpoint
pub mod health;

pub use auth::AuthRoutes;
pub use health::HealthRoutes;

use crate::router::Router;

/// Dispatcher with every application route registered
#[must_use]
pub fn application_router() -> Router {
    let mut router = Router::new();
    AuthRoutes::register(&mut router);
    HealthRoutes::register(&mut router);
    router
}
