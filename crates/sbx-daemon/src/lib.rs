// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-daemon: process bootstrapping for the `sbxd` binary — CLI argument
//! parsing, logger construction, concrete-adapter wiring, and
//! signal-driven graceful shutdown. The orchestration logic itself lives in
//! `sbx-engine`; this crate only supplies the process-level glue around it.

pub mod cli;
pub mod logging;
pub mod shutdown;
pub mod wiring;

pub use cli::Args;
pub use wiring::{build_service, WiringError};
