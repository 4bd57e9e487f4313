// ABOUTME: HTTP front end that owns the request context lifecycle around every dispatched handler
// ABOUTME: Finalizes context resources before the response is written and serves with graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # HTTP Server
//!
//! axum handles the connection; every request lands in one fallback handler
//! that:
//!
//! 1. answers `OPTIONS` with an empty 200
//! 2. dispatches on method and path, answering 404 when nothing matches
//! 3. opens a [`Context`], runs the handler, and closes the context as
//!    completed or failed before the response leaves
//!
//! A handler error always closes the context as failed, so the request's
//! session is rolled back and released before the error response is sent.

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::injection::{CapabilityRegistry, Context, ScopeOutcome};
use crate::middleware::{allow_methods_header, create_request_span, request_id_from_headers, setup_cors};
use crate::resources::ServerResources;
use crate::router::{split_target, RequestHandle, Router};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use http::{Method, StatusCode};
use http_body_util::LengthLimitError;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, info, warn, Instrument, Span};

/// Largest request body read before dispatch
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared state handed to the fallback handler
#[derive(Clone)]
pub struct AppState {
    registry: Arc<CapabilityRegistry>,
    router: Arc<Router>,
}

/// Build the axum application serving `router` with contexts from `registry`
#[must_use]
pub fn app(registry: Arc<CapabilityRegistry>, router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .fallback(handle_request)
        .with_state(AppState { registry, router })
        .layer(allow_methods_header())
        .layer(setup_cors())
}

async fn handle_request(State(state): State<AppState>, request: Request) -> Response {
    let request_id = request_id_from_headers(request.headers());
    let span = create_request_span(request.method().as_str(), request.uri().path(), &request_id);
    let started = Instant::now();

    let response = dispatch(state, request, request_id).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    span.record("status_code", status);
    span.record("duration_ms", elapsed);
    span.in_scope(|| info!(status_code = status, duration_ms = elapsed, "Request completed"));
    response
}

async fn dispatch(state: AppState, request: Request, request_id: String) -> Response {
    let (parts, body) = request.into_parts();
    if parts.method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |target| target.as_str());
    let (path, query) = split_target(target);
    let Some(matched) = state.router.dispatch(&parts.method, target) else {
        debug!("No route matched");
        return AppError::route_not_found().into_response();
    };
    let (path, query) = (path.to_owned(), query.map(str::to_owned));

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return reject_body(body_read_error(&e)),
    };

    let context = state.registry.context();
    Span::current().record("context_id", tracing::field::display(context.id()));
    let handle = RequestHandle::new(
        parts.method,
        path,
        query,
        parts.headers,
        matched.captures,
        context.clone(),
        request_id,
    );

    let outcome = AssertUnwindSafe((matched.handler)(handle, body))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(AppError::internal(panic_message(panic.as_ref()))));

    finish(&context, outcome).await
}

async fn finish(context: &Context, outcome: AppResult<crate::router::Reply>) -> Response {
    match outcome {
        Ok(reply) => match context.close(ScopeOutcome::Completed).await {
            Ok(()) => reply.into_response(),
            Err(error) => error.into_response(),
        },
        Err(error) => {
            if let Err(close_error) = context.close(ScopeOutcome::Failed).await {
                warn!(error = %close_error, "Failed to finalize context after handler error");
            }
            if error.code == ErrorCode::ClientAborted {
                return finish_aborted(&error);
            }
            if !error.code.is_server_error() {
                debug!(code = ?error.code, message = %error.message, "Request rejected");
            }
            error.into_response()
        }
    }
}

/// Classify a failed body read as oversize or as a transport abort
fn body_read_error(error: &axum::Error) -> AppError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return AppError::payload_too_large(format!(
                "Request body exceeds {MAX_BODY_BYTES} bytes"
            ));
        }
        source = current.source();
    }
    AppError::client_aborted(format!("Cannot read body: {error}"))
}

fn reject_body(error: AppError) -> Response {
    if error.code == ErrorCode::ClientAborted {
        return finish_aborted(&error);
    }
    debug!(code = ?error.code, message = %error.message, "Request rejected");
    error.into_response()
}

// Transport aborts are not application failures: no 500 and no error log.
fn finish_aborted(error: &AppError) -> Response {
    debug!(message = %error.message, "Client aborted the request");
    StatusCode::from_u16(error.http_status())
        .unwrap_or(StatusCode::BAD_REQUEST)
        .into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("Handler panicked: {detail}")
}

/// Bind the listener and serve until Ctrl-C or SIGTERM
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run(resources: ServerResources) -> AppResult<()> {
    let address = resources.config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::config(format!("Cannot bind {address}: {e}")))?;
    info!(address = %address, "HTTP server listening");

    let app = app(Arc::clone(&resources.registry), Arc::clone(&resources.router));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("HTTP server failed: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
