// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! stackd daemon entry point.
//!
//! Wires the engine context and worker dispatcher, then waits for shutdown.
//! Job submission arrives through the deployment's transport front end; the
//! daemon itself only hosts the engine.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stackd_core::application::{EngineContext, WorkerDispatcher};
use stackd_core::domain::config::EngineConfig;
use stackd_core::infrastructure::record_store::InMemoryRecordStore;

/// Stack operation dispatch agent.
#[derive(Parser)]
#[command(name = "stackd", version, about, long_about = None)]
struct Cli {
    /// Path to the engine configuration file.
    #[arg(short, long, env = "STACKD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let record_store = Arc::new(InMemoryRecordStore::new());
    let context = EngineContext::initialize(config, record_store);
    let dispatcher = Arc::new(WorkerDispatcher::new(context));

    info!("stackd agent ready; press Ctrl+C to quit");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!(
        active_workers = dispatcher.active_workers(),
        "shutdown signal received, exiting"
    );
    Ok(())
}
