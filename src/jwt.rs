// ABOUTME: Compact HS256 token model and codec used to carry authenticated subjects
// ABOUTME: Verifies the signature in constant time before any header or payload is trusted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Signed Tokens
//!
//! Wire format: `base64url(header).base64url(payload).base64url(signature)`,
//! every segment unpadded, signature = HMAC-SHA256 over the first two
//! segments joined by `.`.
//!
//! The codec only signs and verifies. Expiry and content type are checked by
//! the caller, see [`crate::auth::AuthService::verify`].

use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

/// The only signing algorithm issued and accepted
pub const ALGORITHM: &str = "HS256";
/// The only token type issued and accepted
pub const TOKEN_TYPE: &str = "JWT";

const INVALID_TOKEN: &str = "Invalid JWT";

/// Token header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm, always `HS256`
    pub alg: String,
    /// Token type, always `JWT`
    pub typ: String,
    /// Content type tag (`access` or `refresh`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            alg: ALGORITHM.to_owned(),
            typ: TOKEN_TYPE.to_owned(),
            cty: None,
        }
    }
}

/// A token before encoding or after successful verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    header: TokenHeader,
    payload: Map<String, Value>,
}

impl Token {
    /// Empty token with the default header
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token carrying `payload` under the default header
    #[must_use]
    pub fn with_payload(payload: Map<String, Value>) -> Self {
        Self {
            header: TokenHeader::default(),
            payload,
        }
    }

    /// Header fields
    #[must_use]
    pub const fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Claims keyed by name
    #[must_use]
    pub const fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Consume the token, keeping its claims
    #[must_use]
    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }

    /// `cty` header, used to tell access from refresh tokens
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.header.cty = Some(content_type.into());
    }

    /// `cty` header, if set
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header.cty.as_deref()
    }

    /// Set an arbitrary claim, replacing any previous value
    pub fn add_claim(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(name.into(), value.into());
    }

    /// Any claim by name
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// `sub` claim
    pub fn set_subject(&mut self, subject: impl Into<Value>) {
        self.add_claim("sub", subject);
    }

    /// `iss` claim
    pub fn set_issuer(&mut self, issuer: impl Into<Value>) {
        self.add_claim("iss", issuer);
    }

    /// `aud` claim
    pub fn set_audience(&mut self, audience: impl Into<Value>) {
        self.add_claim("aud", audience);
    }

    /// `iat`, in epoch seconds
    pub fn set_issued_at(&mut self, epoch_seconds: i64) {
        self.add_claim("iat", epoch_seconds);
    }

    /// `exp`, in epoch seconds
    pub fn set_expiration_time(&mut self, epoch_seconds: i64) {
        self.add_claim("exp", epoch_seconds);
    }

    /// `nbf`, in epoch seconds
    pub fn set_not_before(&mut self, epoch_seconds: i64) {
        self.add_claim("nbf", epoch_seconds);
    }

    /// `jti` claim
    pub fn set_jwt_id(&mut self, id: impl Into<Value>) {
        self.add_claim("jti", id);
    }

    /// `sub` claim, if present
    #[must_use]
    pub fn subject(&self) -> Option<&Value> {
        self.claim("sub")
    }

    /// `iss` claim, if present
    #[must_use]
    pub fn issuer(&self) -> Option<&Value> {
        self.claim("iss")
    }

    /// `aud` claim, if present
    #[must_use]
    pub fn audience(&self) -> Option<&Value> {
        self.claim("aud")
    }

    /// `jti` claim, if present
    #[must_use]
    pub fn jwt_id(&self) -> Option<&Value> {
        self.claim("jti")
    }

    /// `iat`, when present and an integer
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.claim("iat").and_then(Value::as_i64)
    }

    /// `exp`, when present and an integer
    #[must_use]
    pub fn expiration_time(&self) -> Option<i64> {
        self.claim("exp").and_then(Value::as_i64)
    }

    /// `nbf`, when present and an integer
    #[must_use]
    pub fn not_before(&self) -> Option<i64> {
        self.claim("nbf").and_then(Value::as_i64)
    }
}

/// HMAC-SHA256 signer and verifier bound to one secret
pub struct TokenCodec {
    key: hmac::Key,
}

impl TokenCodec {
    /// Create a codec signing with `secret`
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        }
    }

    fn sign(&self, header: &str, payload: &str) -> hmac::Tag {
        let mut context = hmac::Context::with_key(&self.key);
        context.update(header.as_bytes());
        context.update(b".");
        context.update(payload.as_bytes());
        context.sign()
    }

    /// Serialize and sign `token`
    ///
    /// # Errors
    ///
    /// Returns an error if a claim cannot be serialized.
    pub fn encode(&self, token: &Token) -> AppResult<String> {
        let header = serde_json::to_vec(&token.header)
            .map_err(|e| AppError::internal(format!("Cannot serialize token header: {e}")))?;
        let payload = serde_json::to_vec(&token.payload)
            .map_err(|e| AppError::internal(format!("Cannot serialize token payload: {e}")))?;

        let header = URL_SAFE_NO_PAD.encode(header);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&header, &payload).as_ref());
        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Verify `raw` and parse it
    ///
    /// The signature is checked first; nothing else in the token is parsed
    /// until it matches. The header must then declare `HS256` and `JWT`.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the token does not have exactly
    /// three segments, if the signature does not match, or if the header or
    /// payload is not valid.
    pub fn decode(&self, raw: &str) -> AppResult<Token> {
        let mut segments = raw.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AppError::authentication("Malformed token"));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AppError::authentication(INVALID_TOKEN))?;
        let expected = self.sign(header, payload);
        if !bool::from(expected.as_ref().ct_eq(signature.as_slice())) {
            return Err(AppError::authentication(INVALID_TOKEN));
        }

        let header: TokenHeader = URL_SAFE_NO_PAD
            .decode(header)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| AppError::authentication(INVALID_TOKEN))?;
        if header.alg != ALGORITHM || header.typ != TOKEN_TYPE {
            return Err(AppError::authentication("Unsupported token algorithm"));
        }

        let payload: Map<String, Value> = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| AppError::authentication(INVALID_TOKEN))?;

        Ok(Token { header, payload })
    }
}
