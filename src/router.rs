// ABOUTME: Ordered method and path dispatcher matching exact paths or anchored patterns
// ABOUTME: Defines the request handle passed to handlers and the reply variants they return
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Request Dispatch
//!
//! Routes are kept per method in registration order and the first route whose
//! matcher accepts the path wins. There is no best-match scoring and no
//! fallback between methods, so a route shadowed by an earlier one is never
//! reached.

use crate::errors::{AppError, AppResult};
use crate::injection::Context;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Type-erased route handler receiving the raw body
pub type Handler =
    Arc<dyn Fn(RequestHandle, Bytes) -> BoxFuture<'static, AppResult<Reply>> + Send + Sync>;

/// How a route selects paths
#[derive(Clone)]
pub enum PathMatcher {
    /// The path must equal the string
    Exact(String),
    /// The pattern must match at the start of the path
    Pattern(Regex),
}

impl PathMatcher {
    /// Compile a pattern matcher
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `pattern` is not a valid regex.
    pub fn pattern(pattern: &str) -> AppResult<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| AppError::config(format!("Invalid route pattern '{pattern}': {e}")))
    }

    fn matches(&self, path: &str) -> Option<PathCaptures> {
        match self {
            Self::Exact(expected) => (expected == path).then(PathCaptures::default),
            Self::Pattern(regex) => {
                let captures = regex.captures(path)?;
                if captures.get(0)?.start() != 0 {
                    return None;
                }
                let groups = captures
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_owned()))
                    .collect();
                let named = regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|m| (name.to_owned(), m.as_str().to_owned()))
                    })
                    .collect();
                Some(PathCaptures { groups, named })
            }
        }
    }
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(path) => write!(f, "Exact({path})"),
            Self::Pattern(regex) => write!(f, "Pattern({})", regex.as_str()),
        }
    }
}

impl From<&str> for PathMatcher {
    fn from(path: &str) -> Self {
        Self::Exact(path.to_owned())
    }
}

impl From<String> for PathMatcher {
    fn from(path: String) -> Self {
        Self::Exact(path)
    }
}

impl From<Regex> for PathMatcher {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

/// Groups captured by a pattern matcher; empty for exact matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathCaptures {
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl PathCaptures {
    /// Positional group, 1-based like regex groups
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(Option::as_deref)
    }

    /// Named group
    #[must_use]
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// What a handler sends back
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with no body
    Empty,
    /// 200 with a plain text body
    Text(String),
    /// 200 with a JSON body
    Json(Value),
}

impl Reply {
    /// Serialize `body` into a JSON reply
    ///
    /// # Errors
    ///
    /// Returns an internal error if `body` cannot be serialized.
    pub fn json<T: Serialize>(body: &T) -> AppResult<Self> {
        serde_json::to_value(body)
            .map(Self::Json)
            .map_err(|e| AppError::internal(format!("Cannot serialize response: {e}")))
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&'static str> for Reply {
    fn from(text: &'static str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Empty => StatusCode::OK.into_response(),
            Self::Text(text) => (
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                )],
                text,
            )
                .into_response(),
            Self::Json(value) => axum::Json(value).into_response(),
        }
    }
}

/// Everything a handler knows about the request it serves
#[derive(Clone)]
pub struct RequestHandle {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    captures: PathCaptures,
    context: Context,
    request_id: String,
}

impl RequestHandle {
    /// Assemble a handle for a matched request
    #[must_use]
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        captures: PathCaptures,
        context: Context,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            headers,
            captures,
            context,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path without query string or fragment
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value, if present and valid UTF-8
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Token from an `Authorization: Bearer` header
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(header::AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    #[must_use]
    pub const fn captures(&self) -> &PathCaptures {
        &self.captures
    }

    /// The request scope every scoped dependency is resolved through
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

struct Route {
    matcher: PathMatcher,
    handler: Handler,
}

/// Result of a successful dispatch
pub struct RouteMatch {
    /// Handler of the winning route
    pub handler: Handler,
    /// Groups captured from the path
    pub captures: PathCaptures,
    /// Position of the winning route among the method's routes
    pub route_index: usize,
}

/// Split a request target into path and query, dropping any fragment
#[must_use]
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    let without_fragment = target.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    }
}

/// Lowercased media type of a `Content-Type` value, without parameters
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Decode a typed body, accepting only `application/json` content
fn decode_body<B: DeserializeOwned>(content_type: Option<&str>, body: &Bytes) -> AppResult<B> {
    if content_type.map(media_type).as_deref() != Some(JSON_MEDIA_TYPE) {
        return Err(AppError::malformed_body(
            "Expected \"Content-Type: application/json\"",
        ));
    }
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        AppError::malformed_body("Invalid Content for \"Content-Type: application/json\"")
            .with_source(e)
    })?;
    serde_json::from_value(value).map_err(AppError::from)
}

/// Method and path dispatcher
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw handler to the routes of `method`
    pub fn register(
        &mut self,
        method: Method,
        matcher: impl Into<PathMatcher>,
        handler: Handler,
    ) -> &mut Self {
        let matcher = matcher.into();
        debug!(method = %method, matcher = ?matcher, "Registered route");
        self.routes
            .entry(method)
            .or_default()
            .push(Route { matcher, handler });
        self
    }

    fn register_bodyless<F, Fut, R>(
        &mut self,
        method: Method,
        matcher: impl Into<PathMatcher>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(RequestHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        let handler: Handler = Arc::new(
            move |request: RequestHandle, _body: Bytes| -> BoxFuture<'static, AppResult<Reply>> {
                let pending = handler(request);
                Box::pin(async move { pending.await.map(Into::into) })
            },
        );
        self.register(method, matcher, handler)
    }

    fn register_with_body<B, F, Fut, R>(
        &mut self,
        method: Method,
        matcher: impl Into<PathMatcher>,
        handler: F,
    ) -> &mut Self
    where
        B: DeserializeOwned + Send + 'static,
        F: Fn(RequestHandle, B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        let handler: Handler = Arc::new(
            move |request: RequestHandle, body: Bytes| -> BoxFuture<'static, AppResult<Reply>> {
                let decoded =
                    decode_body::<B>(request.header(header::CONTENT_TYPE.as_str()), &body);
                match decoded {
                    Ok(payload) => {
                        let pending = handler(request, payload);
                        Box::pin(async move { pending.await.map(Into::into) })
                    }
                    Err(error) => Box::pin(async move { Err(error) }),
                }
            },
        );
        self.register(method, matcher, handler)
    }

    pub fn get<F, Fut, R>(&mut self, matcher: impl Into<PathMatcher>, handler: F) -> &mut Self
    where
        F: Fn(RequestHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.register_bodyless(Method::GET, matcher, handler)
    }

    pub fn head<F, Fut, R>(&mut self, matcher: impl Into<PathMatcher>, handler: F) -> &mut Self
    where
        F: Fn(RequestHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.register_bodyless(Method::HEAD, matcher, handler)
    }

    pub fn delete<F, Fut, R>(&mut self, matcher: impl Into<PathMatcher>, handler: F) -> &mut Self
    where
        F: Fn(RequestHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.register_bodyless(Method::DELETE, matcher, handler)
    }

    /// Register a POST route whose JSON body is decoded into `B`
    pub fn post<B, F, Fut, R>(&mut self, matcher: impl Into<PathMatcher>, handler: F) -> &mut Self
    where
        B: DeserializeOwned + Send + 'static,
        F: Fn(RequestHandle, B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.register_with_body(Method::POST, matcher, handler)
    }

    pub fn put<B, F, Fut, R>(&mut self, matcher: impl Into<PathMatcher>, handler: F) -> &mut Self
    where
        B: DeserializeOwned + Send + 'static,
        F: Fn(RequestHandle, B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.register_with_body(Method::PUT, matcher, handler)
    }

    pub fn patch<B, F, Fut, R>(&mut self, matcher: impl Into<PathMatcher>, handler: F) -> &mut Self
    where
        B: DeserializeOwned + Send + 'static,
        F: Fn(RequestHandle, B) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<R>> + Send + 'static,
        R: Into<Reply>,
    {
        self.register_with_body(Method::PATCH, matcher, handler)
    }

    /// Find the first route of `method` accepting `target`
    ///
    /// Query string and fragment are ignored.
    #[must_use]
    pub fn dispatch(&self, method: &Method, target: &str) -> Option<RouteMatch> {
        let (path, _query) = split_target(target);
        self.routes
            .get(method)?
            .iter()
            .enumerate()
            .find_map(|(route_index, route)| {
                route.matcher.matches(path).map(|captures| RouteMatch {
                    handler: Arc::clone(&route.handler),
                    captures,
                    route_index,
                })
            })
    }

    /// Number of routes registered for `method`
    #[must_use]
    pub fn route_count(&self, method: &Method) -> usize {
        self.routes.get(method).map_or(0, Vec::len)
    }
}
