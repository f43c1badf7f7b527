// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbxd`: the sandbox detonation service binary.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sbx_core::config::Config;
use sbx_daemon::{cli::Args, logging, shutdown, wiring};
use tracing::info;

/// How long `Service::stop` waits for in-flight handlers to drain.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    logging::init(&config.log_level);

    let service = wiring::build_service(&config).await.context("failed to start sandbox service")?;
    info!(vm_count = service.pool_size(), "sandbox detonation service started");

    tokio::select! {
        result = service.run() => {
            result.context("bus subscriber exited unexpectedly")?;
        }
        signal = shutdown::wait_for_shutdown_signal() => {
            signal.context("failed to wait for shutdown signal")?;
            info!("shutdown signal received, draining in-flight jobs");
            service.stop(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    Ok(())
}
