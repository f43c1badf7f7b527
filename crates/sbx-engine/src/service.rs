// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service lifecycle: wires the VM pool, the job handler, and the bus
//! adapters together, and owns the start/stop sequence of §4.F.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::bus::{BusPublisher, BusSubscriber};
use sbx_adapters::hypervisor::HypervisorAdapter;
use sbx_adapters::agent::AgentAdapter;
use sbx_core::domain::Vm;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::handler::{HandlerConfig, JobHandler};
use crate::pool::VmPool;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to enumerate hypervisor domains: {0}")]
    Enumerate(#[source] sbx_adapters::hypervisor::HypervisorError),

    #[error("hypervisor reported no domains to pool")]
    EmptyPool,

    #[error("failed to read agent package at {0}: {1}")]
    ReadPackage(String, std::io::Error),
}

/// Binds one concrete set of adapters into a running service. Generic over
/// the adapter traits so `sbx-daemon` can supply the real implementations
/// and tests can supply fakes.
pub struct Service<H, A, P, S> {
    pool: Arc<VmPool>,
    handler: Arc<JobHandler<H, A, P>>,
    subscriber: Arc<S>,
    topic: String,
    channel: String,
    shutdown: CancellationToken,
}

impl<H, A, P, S> Service<H, A, P, S>
where
    H: HypervisorAdapter,
    A: AgentAdapter,
    P: BusPublisher,
    S: BusSubscriber,
{
    /// Connect to the hypervisor, enumerate its domains into the VM pool,
    /// load the agent package from disk, and build the job handler. Does
    /// not yet consume; call `run` to begin.
    pub async fn start(
        hypervisor: H,
        agent: A,
        publisher: P,
        subscriber: S,
        agent_package_path: impl AsRef<Path>,
        handler_config: HandlerConfig,
        topic: String,
        channel: String,
    ) -> Result<Self, StartError> {
        let hypervisor = Arc::new(hypervisor);
        let domains = hypervisor.domains().await.map_err(StartError::Enumerate)?;
        if domains.is_empty() {
            return Err(StartError::EmptyPool);
        }

        let vms: Vec<Vm> = domains
            .iter()
            .map(|d| Vm::new(d.dom_handle.0, format!("vm-{}", d.dom_handle.0), d.ip.clone(), d.dom_handle))
            .collect();
        let pool_size = vms.len();
        let pool = Arc::new(VmPool::new(vms));
        info!(vm_count = pool_size, "VM pool built");

        let package_path = agent_package_path.as_ref();
        let package = tokio::fs::read(package_path)
            .await
            .map_err(|e| StartError::ReadPackage(package_path.display().to_string(), e))?;

        let handler = Arc::new(JobHandler::new(
            pool.clone(),
            hypervisor,
            Arc::new(agent),
            Arc::new(publisher),
            Arc::from(package),
            handler_config,
        ));

        Ok(Self {
            pool,
            handler,
            subscriber: Arc::new(subscriber),
            topic,
            channel,
            shutdown: CancellationToken::new(),
        })
    }

    /// Number of VMs available to this service; also the concurrency bound
    /// handed to the subscriber.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Consume until `stop` is called. Concurrency is bounded to the pool
    /// size: there is never a point in admitting more in-flight jobs than
    /// there are VMs to run them on.
    pub async fn run(&self) -> Result<(), sbx_adapters::bus::BusError> {
        self.subscriber
            .subscribe(&self.topic, &self.channel, self.pool_size(), self.handler.clone(), self.shutdown.clone())
            .await
    }

    /// Signal `run` to stop consuming new messages and wait for in-flight
    /// handlers to drain, bounded by `grace_period`.
    pub async fn stop(&self, grace_period: Duration) {
        self.shutdown.cancel();
        tokio::time::sleep(grace_period).await;
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
