// ABOUTME: axum response conversion for AppError
// ABOUTME: Logs server-side failures and renders a client-safe JSON error body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{AppError, ErrorResponse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.code.is_server_error() {
            // The client only ever sees the generic message
            tracing::error!(
                error.code = ?self.code,
                error.source = ?self.source,
                "Request failed: {}",
                self.message
            );
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
