// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-core: shared domain types, configuration, and error kinds for the
//! sandbox detonation service.

pub mod config;
pub mod domain;
pub mod error;

pub use config::{AgentCfg, Config, ConsumerCfg, ProducerCfg, VirtManagerCfg};
pub use domain::{DomainHandle, FileScanJob, OutboundMessage, PayloadEntry, ScanResult, Vm};
pub use error::ConfigError;
