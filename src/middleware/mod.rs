// ABOUTME: HTTP middleware for request tracing and cross-origin access
// ABOUTME: Provides request ID resolution, span creation and the CORS layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

pub mod cors;
pub mod tracing;

// CORS configuration
pub use cors::{allow_methods_header, setup_cors};

// Request tracing
pub use self::tracing::{create_request_span, request_id_from_headers};
