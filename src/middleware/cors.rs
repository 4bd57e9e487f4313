// ABOUTME: CORS middleware configuration for the survey API
// ABOUTME: Allows any origin and advertises the GET, POST and OPTIONS methods on every response
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Methods browsers may use against the API
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

/// Configure CORS for the survey API
///
/// Any origin is accepted. Preflight requests are answered by the layer
/// itself; see [`allow_methods_header`] for the header attached to ordinary
/// responses.
#[must_use]
pub fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}

/// Advertise the allowed methods on every response, not only preflights
#[must_use]
pub fn allow_methods_header() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    )
}
