// ABOUTME: Liveness route used by probes and smoke tests
// ABOUTME: Answers with a fixed plain text body and touches no storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::routes;
use crate::errors::AppResult;
use crate::router::{RequestHandle, Router};

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Register the liveness route
    pub fn register(router: &mut Router) {
        router.get(routes::TEST, test_handler);
    }
}

async fn test_handler(_request: RequestHandle) -> AppResult<&'static str> {
    Ok("Test")
}
