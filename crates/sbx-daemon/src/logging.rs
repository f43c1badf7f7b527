// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logger construction from the configured `log_level`.

use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber::fmt` subscriber filtered to `log_level`.
///
/// `log_level` is a directive understood by `EnvFilter` (`"info"`,
/// `"debug"`, `"sbx_engine=debug,warn"`, ...); `RUST_LOG`, if set, still
/// takes precedence, matching `EnvFilter`'s normal precedence rules.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
