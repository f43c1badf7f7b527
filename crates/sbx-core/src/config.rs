// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service configuration, loaded from a TOML file at startup.
//!
//! The field names and nesting mirror the original Go `mapstructure` tags
//! one-for-one so existing deployment config files keep working unchanged.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub shared_volume: String,
    pub snapshot_name: String,
    pub agent: AgentCfg,
    pub libvirt: VirtManagerCfg,
    pub producer: ProducerCfg,
    pub consumer: ConsumerCfg,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentCfg {
    pub dest_dir: String,
    pub package_name: String,
    #[serde(default = "default_deploy_timeout_ms")]
    pub deploy_timeout_ms: u64,
    #[serde(default = "default_analyze_timeout_ms")]
    pub analyze_timeout_ms: u64,
}

fn default_deploy_timeout_ms() -> u64 {
    30_000
}

fn default_analyze_timeout_ms() -> u64 {
    120_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtManagerCfg {
    pub network: String,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProducerCfg {
    pub nsqd: String,
    pub topic: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerCfg {
    pub topic: String,
    pub channel: String,
    pub lookupds: Vec<String>,
}

impl Config {
    /// Load and validate a config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let cfg: Config = toml::from_str(&raw)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), Box::new(e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.consumer.lookupds.is_empty() {
            return Err(ConfigError::Invalid {
                field: "consumer.lookupds",
                reason: "at least one nsqlookupd address is required".to_string(),
            });
        }
        if self.libvirt.network != "unix" && self.libvirt.port == 0 {
            return Err(ConfigError::Invalid {
                field: "libvirt.port",
                reason: "must be nonzero when libvirt.network is not \"unix\"".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
