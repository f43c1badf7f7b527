// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line arguments for `sbxd`.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "sbxd", about = "Sandbox detonation service")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, short = 'c', default_value = "/etc/sbx/sbxd.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
