// ABOUTME: Context-scoped authentication service minting and verifying access and refresh tokens
// ABOUTME: Looks credentials up through the request context without revealing which check failed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Authentication
//!
//! Access tokens carry the full `{id, role, name}` subject; refresh tokens
//! carry only the user id. Both are plain HS256 tokens distinguished by
//! their `cty` header.

use crate::crypto::PasswordEncoder;
use crate::database::UserRepository;
use crate::errors::{AppError, AppResult};
use crate::injection::{Capability, CapabilityKind, Context};
use crate::jwt::{Token, TokenCodec};
use crate::models::{User, UserSubject};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// `cty` of access tokens
pub const ACCESS_CONTENT_TYPE: &str = "access";
/// `cty` of refresh tokens
pub const REFRESH_CONTENT_TYPE: &str = "refresh";

const WRONG_CREDENTIALS: &str = "Wrong credentials";

/// Tokens returned by a successful login or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short lived token carrying the subject
    pub access_token: String,
    /// Token exchanged for a new pair
    pub refresh_token: String,
    /// Lifetime of the access token in seconds
    #[serde(rename = "expiration")]
    pub expires_in_seconds: i64,
}

/// Authenticates users and issues tokens
pub struct AuthService {
    codec: Arc<TokenCodec>,
    password_encoder: Arc<dyn PasswordEncoder>,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl Capability for AuthService {
    const NAME: &'static str = "AuthService";
    const KIND: CapabilityKind = CapabilityKind::ContextOnly;
}

impl AuthService {
    /// Create a service; lifetimes are in seconds
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        password_encoder: Arc<dyn PasswordEncoder>,
        access_ttl: i64,
        refresh_ttl: i64,
    ) -> Self {
        Self {
            codec,
            password_encoder,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Look up the user owning `username` and `password`
    ///
    /// Unknown users and wrong passwords fail with the same error.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if no user matches, or the error of
    /// the underlying lookup.
    pub async fn authenticate(
        &self,
        context: &Context,
        username: &str,
        password: &str,
    ) -> AppResult<User> {
        let users = context.resolve::<dyn UserRepository>().await?;
        let encoded = self.password_encoder.encode(password);

        if let Some(user) = users
            .get_user_by_username_and_password(username, &encoded)
            .await?
        {
            debug!(user.id = user.id, "User authenticated");
            return Ok(user);
        }

        warn!(username = %username, "Authentication failed");
        Err(AppError::authentication(WRONG_CREDENTIALS))
    }

    /// Mint an access and a refresh token for `user`
    ///
    /// # Errors
    ///
    /// Returns an error if the tokens cannot be encoded.
    pub fn issue_tokens(&self, user: &User) -> AppResult<TokenPair> {
        self.issue_tokens_at(user, Utc::now().timestamp())
    }

    /// Mint tokens as if the current time were `now` (epoch seconds)
    ///
    /// # Errors
    ///
    /// Returns an error if an expiry does not fit in epoch seconds or the
    /// tokens cannot be encoded.
    pub fn issue_tokens_at(&self, user: &User, now: i64) -> AppResult<TokenPair> {
        let subject = serde_json::to_value(user.subject())
            .map_err(|e| AppError::internal(format!("Cannot serialize subject: {e}")))?;

        let mut access = Token::new();
        access.set_content_type(ACCESS_CONTENT_TYPE);
        access.set_subject(subject);
        access.set_issued_at(now);
        access.set_expiration_time(expiry(now, self.access_ttl)?);

        let mut refresh = Token::new();
        refresh.set_content_type(REFRESH_CONTENT_TYPE);
        refresh.set_subject(user.id);
        refresh.set_issued_at(now);
        refresh.set_expiration_time(expiry(now, self.refresh_ttl)?);

        Ok(TokenPair {
            access_token: self.codec.encode(&access)?,
            refresh_token: self.codec.encode(&refresh)?,
            expires_in_seconds: self.access_ttl,
        })
    }

    /// Decode `raw` and check its content type and validity window
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the signature is invalid, if the
    /// content type differs from `content_type`, or if the token is expired
    /// or not yet valid.
    pub fn verify(&self, raw: &str, content_type: &str) -> AppResult<Token> {
        self.verify_at(raw, content_type, Utc::now().timestamp())
    }

    /// [`AuthService::verify`] at an explicit time
    ///
    /// # Errors
    ///
    /// See [`AuthService::verify`].
    pub fn verify_at(&self, raw: &str, content_type: &str, now: i64) -> AppResult<Token> {
        let token = self.codec.decode(raw)?;

        if token.content_type() != Some(content_type) {
            return Err(AppError::authentication("Wrong token type"));
        }
        let expires = token
            .expiration_time()
            .ok_or_else(|| AppError::authentication("Token has no expiration"))?;
        if expires <= now {
            return Err(AppError::authentication("Expired JWT"));
        }
        if token.not_before().is_some_and(|nbf| nbf > now) {
            return Err(AppError::authentication("Token not valid yet"));
        }
        Ok(token)
    }

    /// Exchange a refresh token for a new pair
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the refresh token does not verify
    /// or names a user that no longer exists.
    pub async fn refresh(&self, context: &Context, raw: &str) -> AppResult<TokenPair> {
        let token = self.verify(raw, REFRESH_CONTENT_TYPE)?;
        let user_id = token
            .subject()
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| AppError::authentication("Refresh token has no subject"))?;

        let users = context.resolve::<dyn UserRepository>().await?;
        let Some(user) = users.get_user_by_id(user_id).await? else {
            warn!(user.id = user_id, "Refresh token for unknown user");
            return Err(AppError::authentication("Unknown user"));
        };
        self.issue_tokens(&user)
    }

    /// Verify an access token and return its subject
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the token does not verify or its
    /// subject is not a user subject.
    pub fn subject_from_access_token(&self, raw: &str) -> AppResult<UserSubject> {
        let token = self.verify(raw, ACCESS_CONTENT_TYPE)?;
        let subject = token
            .subject()
            .cloned()
            .ok_or_else(|| AppError::authentication("Access token has no subject"))?;
        serde_json::from_value(subject)
            .map_err(|_| AppError::authentication("Access token subject is malformed"))
    }
}

fn expiry(now: i64, ttl: i64) -> AppResult<i64> {
    now.checked_add(ttl)
        .ok_or_else(|| AppError::internal(format!("Token lifetime {ttl}s overflows at {now}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256PasswordEncoder;
    use crate::database::NewUser;
    use crate::errors::ErrorCode;
    use crate::injection::CapabilityRegistry;
    use crate::models::Role;
    use async_trait::async_trait;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    struct FixedUsers {
        users: Vec<User>,
    }

    #[async_trait]
    impl UserRepository for FixedUsers {
        async fn get_user_by_username_and_password(
            &self,
            username: &str,
            encoded_password: &str,
        ) -> AppResult<Option<User>> {
            Ok(self
                .users
                .iter()
                .find(|u| u.username == username && u.password == encoded_password)
                .cloned())
        }

        async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
            Ok(self.users.iter().find(|u| u.id == id).cloned())
        }

        async fn create_user(&self, _user: NewUser) -> AppResult<User> {
            Err(AppError::internal("read-only"))
        }
    }

    fn alice() -> User {
        User {
            id: 5,
            role: Role::Researcher,
            name: "Alice".to_owned(),
            username: "alice".to_owned(),
            password: Sha256PasswordEncoder.encode("s3cret"),
            organization_id: Some(1),
        }
    }

    #[test]
    fn test_overflowing_ttl_is_an_error() {
        let service = AuthService::new(
            Arc::new(TokenCodec::new(b"unit-secret")),
            Arc::new(Sha256PasswordEncoder),
            i64::MAX,
            3600,
        );
        let error = service.issue_tokens_at(&alice(), NOW).err().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError);

        let service = AuthService::new(
            Arc::new(TokenCodec::new(b"unit-secret")),
            Arc::new(Sha256PasswordEncoder),
            1800,
            i64::MAX - NOW + 1,
        );
        let error = service.issue_tokens_at(&alice(), NOW).err().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError);
    }

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(TokenCodec::new(b"unit-secret")),
            Arc::new(Sha256PasswordEncoder),
            1800,
            3600,
        )
    }

    fn context() -> Context {
        let mut builder = CapabilityRegistry::builder();
        builder
            .register_scoped::<dyn UserRepository, _, _>(|_| async {
                Ok(Arc::new(FixedUsers {
                    users: vec![alice()],
                }) as Arc<dyn UserRepository>)
            })
            .unwrap();
        builder.build().context()
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_fail_identically() {
        let service = service();
        let context = context();

        let wrong_password = service
            .authenticate(&context, "alice", "wrong")
            .await
            .err()
            .unwrap();
        let unknown_user = service
            .authenticate(&context, "ghost", "x")
            .await
            .err()
            .unwrap();

        assert_eq!(wrong_password.code, ErrorCode::AuthenticationFailure);
        assert_eq!(wrong_password.code, unknown_user.code);
        assert_eq!(wrong_password.message, unknown_user.message);
    }

    #[tokio::test]
    async fn test_correct_credentials_return_user() {
        let user = service()
            .authenticate(&context(), "alice", "s3cret")
            .await
            .unwrap();
        assert_eq!(user.id, 5);
    }

    #[test]
    fn test_issued_tokens_carry_expected_claims() {
        let service = service();
        let pair = service.issue_tokens_at(&alice(), NOW).unwrap();
        assert_eq!(pair.expires_in_seconds, 1800);

        let access = service
            .verify_at(&pair.access_token, ACCESS_CONTENT_TYPE, NOW)
            .unwrap();
        assert_eq!(access.issued_at(), Some(NOW));
        assert_eq!(access.expiration_time(), Some(NOW + 1800));
        assert_eq!(
            access.subject(),
            Some(&json!({"id": 5, "role": "RESEARCHER", "name": "Alice"}))
        );

        let refresh = service
            .verify_at(&pair.refresh_token, REFRESH_CONTENT_TYPE, NOW)
            .unwrap();
        assert_eq!(refresh.subject(), Some(&json!(5)));
        assert_eq!(refresh.expiration_time(), Some(NOW + 3600));
    }

    #[test]
    fn test_token_pair_wire_names() {
        let pair = service().issue_tokens_at(&alice(), NOW).unwrap();
        let json = serde_json::to_value(&pair).unwrap();
        assert!(json.get("accessToken").is_some());
        assert!(json.get("refreshToken").is_some());
        assert_eq!(json["expiration"], 1800);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = service();
        let pair = service.issue_tokens_at(&alice(), NOW).unwrap();

        let error = service
            .verify_at(&pair.access_token, ACCESS_CONTENT_TYPE, NOW + 1800)
            .err()
            .unwrap();
        assert_eq!(error.code, ErrorCode::AuthenticationFailure);
        assert!(service
            .verify_at(&pair.access_token, ACCESS_CONTENT_TYPE, NOW + 1799)
            .is_ok());
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let service = service();
        let pair = service.issue_tokens_at(&alice(), NOW).unwrap();
        let error = service
            .verify_at(&pair.refresh_token, ACCESS_CONTENT_TYPE, NOW)
            .err()
            .unwrap();
        assert_eq!(error.code, ErrorCode::AuthenticationFailure);
    }

    #[tokio::test]
    async fn test_refresh_issues_new_pair_for_existing_user() {
        let service = service();
        let pair = service.issue_tokens(&alice()).unwrap();

        let renewed = service.refresh(&context(), &pair.refresh_token).await.unwrap();
        let subject = service
            .subject_from_access_token(&renewed.access_token)
            .unwrap();
        assert_eq!(subject, alice().subject());
    }
}
