// ABOUTME: Startup wiring of the capability registry, datasource and dispatcher
// ABOUTME: Registers every provider once so the registry is read-only while serving
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server Resources
//!
//! | Capability          | Provider  | Implementation            |
//! |---------------------|-----------|---------------------------|
//! | `PasswordEncoder`   | singleton | `Sha256PasswordEncoder`   |
//! | `Datasource`        | singleton | `SqliteDatasource`        |
//! | `SqliteSession`     | context   | `Datasource::create_session` |
//! | `UserRepository`    | context   | `SqliteUserRepository`    |
//! | `AuthService`       | context   | `AuthService`             |

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::crypto::{PasswordEncoder, Sha256PasswordEncoder};
use crate::database::{
    Datasource, SqliteDatasource, SqliteSession, SqliteUserRepository, UserRepository,
};
use crate::errors::AppResult;
use crate::injection::{CapabilityRegistry, Context};
use crate::jwt::TokenCodec;
use crate::router::Router;
use crate::routes::application_router;
use std::sync::Arc;
use tracing::info;

/// Everything the HTTP server shares across requests
#[derive(Clone)]
pub struct ServerResources {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<CapabilityRegistry>,
    pub router: Arc<Router>,
}

impl ServerResources {
    /// Prepare storage and wire the registry and routes for `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the datasource cannot be created or initialized,
    /// or if a provider registration is rejected.
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let datasource = Arc::new(SqliteDatasource::new(
            &config.database.url,
            config.database.prune,
            config.storage_timeout(),
        )?);
        datasource.init().await?;

        let registry = build_registry(&config, datasource)?;
        info!("Capability registry ready");

        Ok(Self {
            config: Arc::new(config),
            registry,
            router: Arc::new(application_router()),
        })
    }
}

/// Register every provider used by the application
///
/// # Errors
///
/// Returns an error if a registration is rejected, which indicates a wiring
/// bug and should abort startup.
pub fn build_registry(
    config: &ServerConfig,
    datasource: Arc<dyn Datasource>,
) -> AppResult<Arc<CapabilityRegistry>> {
    let codec = Arc::new(TokenCodec::new(config.auth.jwt_secret.as_bytes()));
    let access_ttl = config.auth.access_expiration_secs;
    let refresh_ttl = config.auth.refresh_expiration_secs;

    let mut builder = CapabilityRegistry::builder();
    builder
        .register_singleton::<dyn PasswordEncoder, _>(|| {
            Ok(Arc::new(Sha256PasswordEncoder) as Arc<dyn PasswordEncoder>)
        })?
        .register_singleton::<dyn Datasource, _>(move || Ok(Arc::clone(&datasource)))?
        .register_scoped::<SqliteSession, _, _>(|context: Context| async move {
            let datasource = context.singleton::<dyn Datasource>()?;
            let session = Arc::new(datasource.create_session().await?);
            context.defer_close(Arc::clone(&session));
            Ok(session)
        })?
        .register_scoped::<dyn UserRepository, _, _>(|context: Context| async move {
            let session = context.resolve::<SqliteSession>().await?;
            Ok(Arc::new(SqliteUserRepository::new(session)) as Arc<dyn UserRepository>)
        })?
        .register_scoped::<AuthService, _, _>(move |context: Context| {
            let codec = Arc::clone(&codec);
            async move {
                let encoder = context.singleton::<dyn PasswordEncoder>()?;
                Ok(Arc::new(AuthService::new(
                    codec,
                    encoder,
                    access_ttl,
                    refresh_ttl,
                )))
            }
        })?;

    Ok(builder.build())
}
