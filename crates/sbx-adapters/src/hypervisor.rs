// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hypervisor adapter: domain enumeration and snapshot revert.
//!
//! The `virt` crate exposes connection and domain bindings but not
//! snapshot-revert, so `revert` shells out to `virsh` the same way the
//! libvirt backend in the retrieval pack does for the same gap.

use async_trait::async_trait;
use sbx_core::domain::DomainHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HypervisorError {
    #[error("failed to connect to hypervisor at {0}: {1}")]
    Connect(String, String),

    #[error("failed to enumerate domains: {0}")]
    Enumerate(String),

    #[error("failed to revert domain {0} to snapshot {1}: {2}")]
    Revert(DomainHandle, String, String),
}

/// One libvirt domain as seen by the pool builder at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub dom_handle: DomainHandle,
    pub ip: String,
    pub snapshot_names: Vec<String>,
}

#[async_trait]
pub trait HypervisorAdapter: Send + Sync + 'static {
    /// Enumerate active domains known to the hypervisor.
    async fn domains(&self) -> Result<Vec<Domain>, HypervisorError>;

    /// Revert a domain to a named snapshot. Callers treat failure as
    /// non-fatal and continue the job regardless (see `sbx-engine::handler`).
    async fn revert(&self, dom: DomainHandle, snapshot_name: &str) -> Result<(), HypervisorError>;
}

/// Real adapter, backed by `virt::connect::Connect` for enumeration and
/// `virsh` for snapshot revert.
pub struct LibvirtHypervisor {
    connection: virt::connect::Connect,
}

impl LibvirtHypervisor {
    /// Connect to a hypervisor. `network = "unix"` uses the local socket
    /// transport and ignores `address`/`port`; any other value builds a
    /// `qemu+tcp://address:port/system` URI.
    pub fn connect(network: &str, address: &str, port: u16) -> Result<Self, HypervisorError> {
        let uri = if network == "unix" {
            "qemu:///system".to_string()
        } else {
            format!("qemu+{network}://{address}:{port}/system")
        };
        let connection = virt::connect::Connect::open(Some(&uri))
            .map_err(|e| HypervisorError::Connect(uri, e.to_string()))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl HypervisorAdapter for LibvirtHypervisor {
    async fn domains(&self) -> Result<Vec<Domain>, HypervisorError> {
        let domains = self
            .connection
            .list_all_domains(virt::sys::VIR_CONNECT_LIST_DOMAINS_ACTIVE)
            .map_err(|e| HypervisorError::Enumerate(e.to_string()))?;

        let mut out = Vec::with_capacity(domains.len());
        for dom in domains {
            let id = dom.get_id().unwrap_or_default() as i32;
            let ip = domain_ip(&dom).map_err(|e| HypervisorError::Enumerate(e.to_string()))?;
            let snapshot_names = dom
                .snapshot_list_names(0)
                .map_err(|e| HypervisorError::Enumerate(e.to_string()))?;
            out.push(Domain { dom_handle: DomainHandle(id), ip, snapshot_names });
        }
        Ok(out)
    }

    async fn revert(&self, dom: DomainHandle, snapshot_name: &str) -> Result<(), HypervisorError> {
        let domain_name = self
            .connection
            .list_all_domains(0)
            .ok()
            .and_then(|domains| {
                domains
                    .into_iter()
                    .find(|d| d.get_id().unwrap_or_default() as i32 == dom.0)
                    .and_then(|d| d.get_name().ok())
            })
            .ok_or_else(|| {
                HypervisorError::Revert(dom, snapshot_name.to_string(), "domain not found".to_string())
            })?;

        let output = tokio::process::Command::new("virsh")
            .args(["snapshot-revert", &domain_name, snapshot_name])
            .output()
            .await
            .map_err(|e| HypervisorError::Revert(dom, snapshot_name.to_string(), e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(HypervisorError::Revert(dom, snapshot_name.to_string(), stderr));
        }
        Ok(())
    }
}

/// Domains in this fleet advertise their guest IP via the first lease on
/// the `default` virtual network's DHCP server, keyed by MAC address.
fn domain_ip(dom: &virt::domain::Domain) -> Result<String, virt::error::Error> {
    let interfaces = dom.interface_addresses(virt::sys::VIR_DOMAIN_INTERFACE_ADDRESSES_SRC_LEASE, 0)?;
    for iface in interfaces {
        if let Some(addr) = iface.addrs.into_iter().next() {
            return Ok(addr.addr);
        }
    }
    Ok(String::new())
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RevertCall {
        pub dom: DomainHandle,
        pub snapshot_name: String,
    }

    #[derive(Default)]
    struct FakeState {
        domains: Vec<Domain>,
        reverts: Vec<RevertCall>,
        fail_revert_for: Option<DomainHandle>,
    }

    /// In-memory hypervisor adapter for tests. Domains are fixed at
    /// construction; `revert` records every call and can be told to fail
    /// for a specific domain.
    #[derive(Clone)]
    pub struct FakeHypervisorAdapter {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeHypervisorAdapter {
        pub fn new(domains: Vec<Domain>) -> Self {
            Self { state: Arc::new(Mutex::new(FakeState { domains, ..Default::default() })) }
        }

        pub fn fail_revert_for(&self, dom: DomainHandle) {
            self.state.lock().fail_revert_for = Some(dom);
        }

        pub fn reverts(&self) -> Vec<RevertCall> {
            self.state.lock().reverts.clone()
        }
    }

    #[async_trait]
    impl HypervisorAdapter for FakeHypervisorAdapter {
        async fn domains(&self) -> Result<Vec<Domain>, HypervisorError> {
            Ok(self.state.lock().domains.clone())
        }

        async fn revert(&self, dom: DomainHandle, snapshot_name: &str) -> Result<(), HypervisorError> {
            let mut state = self.state.lock();
            state.reverts.push(RevertCall { dom, snapshot_name: snapshot_name.to_string() });
            if state.fail_revert_for == Some(dom) {
                return Err(HypervisorError::Revert(
                    dom,
                    snapshot_name.to_string(),
                    "simulated failure".to_string(),
                ));
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHypervisorAdapter, RevertCall};

#[cfg(test)]
#[path = "hypervisor_tests.rs"]
mod tests;
