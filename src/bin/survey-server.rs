// ABOUTME: Server binary for the survey API runtime
// ABOUTME: Loads configuration from the environment, prepares storage and serves HTTP until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Survey Server Binary
//!
//! Starts the survey API with environment configuration. Command line flags
//! override the matching environment variables.

use anyhow::Result;
use clap::Parser;
use survey_runtime::{config::ServerConfig, logging, resources::ServerResources, server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "survey-server")]
#[command(about = "Survey API - token authenticated HTTP API over SQLite")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override the SQLite database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Recreate the database schema on startup
    #[arg(long)]
    prune: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http.port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database.url = database_url;
    }
    if args.prune {
        config.database.prune = true;
    }

    info!("Starting survey server");
    info!("{}", config.summary());

    let resources = ServerResources::new(config).await?;
    if let Err(e) = server::run(resources).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
