// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain types shared by the VM pool, the adapters, and the job handler.

use serde::{Deserialize, Serialize};

/// Opaque handle the hypervisor adapter uses to address a domain.
///
/// Carries the hypervisor-assigned numeric domain id. The pool and the job
/// handler never interpret it; only `sbx-adapters::hypervisor` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainHandle(pub i32);

impl std::fmt::Display for DomainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The runtime descriptor of one analysis virtual machine.
///
/// `in_use` only ever changes under the pool's mutex (see `sbx_engine::pool`);
/// this type itself carries no synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct Vm {
    pub id: i32,
    pub name: String,
    pub ip: String,
    pub snapshots: Vec<String>,
    pub in_use: bool,
    pub dom: DomainHandle,
}

impl Vm {
    pub fn new(id: i32, name: impl Into<String>, ip: impl Into<String>, dom: DomainHandle) -> Self {
        Self { id, name: name.into(), ip: ip.into(), snapshots: Vec::new(), in_use: false, dom }
    }
}

/// The decoded payload of an inbound bus message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileScanJob {
    pub sha256: String,
    /// Opaque configuration passed through to the guest agent unmodified.
    pub dynamic: serde_json::Value,
}

/// Internal product of one detonation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    pub res: serde_json::Value,
    pub version: String,
}

/// One payload slot inside an [`OutboundMessage`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadEntry {
    pub module: String,
    /// JSON-encoded bytes of a `ScanResult`.
    pub body: Vec<u8>,
}

/// Envelope published to the downstream topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    pub sha256: String,
    pub payload: Vec<PayloadEntry>,
}

impl OutboundMessage {
    /// Build the single-payload envelope the core always emits: one
    /// `module = "sandbox"` entry carrying the JSON-encoded scan result.
    pub fn sandbox(sha256: impl Into<String>, result: &ScanResult) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(result)?;
        Ok(Self {
            sha256: sha256.into(),
            payload: vec![PayloadEntry { module: "sandbox".to_string(), body }],
        })
    }
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;
