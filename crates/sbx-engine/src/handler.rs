// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job handler: per-message orchestration binding the bus, the VM pool, and
//! the hypervisor/guest-agent adapters into one detonation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sbx_adapters::agent::{AgentAdapter, AgentError};
use sbx_adapters::bus::{BusError, BusPublisher, Message, MessageHandler};
use sbx_adapters::hypervisor::HypervisorAdapter;
use sbx_core::domain::{FileScanJob, OutboundMessage, ScanResult, Vm};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pool::VmPool;

/// Error kinds surfaced by the handler, matching the disposition taxonomy:
/// every variant here nacks the message except `RevertError`, which is
/// logged and does not abort the detonation (there is no `HandlerError`
/// variant for it — see `detonate`).
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("message body is empty")]
    EmptyBody,

    #[error("failed to decode job: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("no free VM available")]
    NoFreeVm,

    #[error("failed to connect to guest agent: {0}")]
    AgentConnect(#[source] AgentError),

    #[error("failed to deploy agent package: {0}")]
    Deploy(#[source] AgentError),

    #[error("failed to read sample: {0}")]
    SampleRead(#[source] std::io::Error),

    #[error("analysis failed: {0}")]
    Analyze(#[source] AgentError),

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to publish result: {0}")]
    Publish(#[source] BusError),
}

/// Config the handler needs per job; distinct from `sbx_core::Config` so
/// the handler stays generic over how its caller sources these values.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub shared_volume: PathBuf,
    pub snapshot_name: String,
    pub agent_dest_dir: String,
    pub deploy_timeout: Duration,
    pub analyze_timeout: Duration,
    pub output_topic: String,
}

/// Binds one VM pool, one hypervisor adapter, one agent adapter, and one
/// publisher into the state machine of §4.E. Generic over the adapter
/// traits so it runs unchanged against fakes in tests.
pub struct JobHandler<H, A, P> {
    pool: Arc<VmPool>,
    hypervisor: Arc<H>,
    agent: Arc<A>,
    publisher: Arc<P>,
    package: Arc<[u8]>,
    config: HandlerConfig,
}

impl<H, A, P> JobHandler<H, A, P>
where
    H: HypervisorAdapter,
    A: AgentAdapter,
    P: BusPublisher,
{
    pub fn new(
        pool: Arc<VmPool>,
        hypervisor: Arc<H>,
        agent: Arc<A>,
        publisher: Arc<P>,
        package: Arc<[u8]>,
        config: HandlerConfig,
    ) -> Self {
        Self { pool, hypervisor, agent, publisher, package, config }
    }

    /// Decode, acquire, detonate, release, encode, publish — the full
    /// per-message pipeline. Once `acquire` returns a VM, every exit path
    /// below releases it exactly once before returning.
    pub async fn process(&self, body: &[u8]) -> Result<(), HandlerError> {
        if body.is_empty() {
            return Err(HandlerError::EmptyBody);
        }

        let job: FileScanJob = serde_json::from_slice(body).map_err(HandlerError::Decode)?;
        info!(sha256 = %job.sha256, "start processing");

        let vm = self.pool.acquire().ok_or(HandlerError::NoFreeVm)?;
        info!(sha256 = %job.sha256, vm = %vm.name, "VM selected");

        // From here on, `vm` is held: every branch below must release it
        // exactly once before this function returns.
        let detonation = self.detonate(&vm, &job).await;
        self.pool.release(&vm);

        let scan_result = match detonation {
            Ok(result) => result,
            Err(err) => {
                error!(sha256 = %job.sha256, vm = %vm.name, error = %err, "detonation failed");
                return Err(err);
            }
        };

        let outbound = OutboundMessage::sandbox(job.sha256.as_str(), &scan_result).map_err(HandlerError::Encode)?;
        let encoded = serde_json::to_vec(&outbound).map_err(HandlerError::Encode)?;

        self.publisher
            .publish(&self.config.output_topic, &encoded)
            .await
            .map_err(|err| {
                error!(sha256 = %job.sha256, error = %err, "publish failed");
                HandlerError::Publish(err)
            })?;

        info!(sha256 = %job.sha256, "published result");
        Ok(())
    }

    /// Revert → connect → deploy → read sample → analyze. `vm` is already
    /// held by the caller; this never touches pool state. One agent client
    /// is opened and reused for both the deploy and the analyze call —
    /// there is no pooling across detonations.
    async fn detonate(&self, vm: &Vm, job: &FileScanJob) -> Result<ScanResult, HandlerError> {
        if let Err(err) = self.hypervisor.revert(vm.dom, &self.config.snapshot_name).await {
            warn!(vm = %vm.name, error = %err, "revert failed, continuing with detonation anyway");
        }

        let mut client = self.agent.connect(&vm.ip).await.map_err(HandlerError::AgentConnect)?;

        let version = self
            .agent
            .deploy(&mut client, &self.config.agent_dest_dir, &self.package, self.config.deploy_timeout)
            .await
            .map_err(HandlerError::Deploy)?;
        info!(vm = %vm.name, version, "agent package deployed");

        let sample_path = self.config.shared_volume.join(&job.sha256);
        let sample = tokio::fs::read(&sample_path).await.map_err(HandlerError::SampleRead)?;

        let dynamic_config = serde_json::to_vec(&job.dynamic).map_err(HandlerError::Encode)?;
        let res = self
            .agent
            .analyze(&mut client, &dynamic_config, &sample, self.config.analyze_timeout)
            .await
            .map_err(HandlerError::Analyze)?;

        Ok(ScanResult { res, version })
    }
}

#[async_trait]
impl<H, A, P> MessageHandler for JobHandler<H, A, P>
where
    H: HypervisorAdapter,
    A: AgentAdapter,
    P: BusPublisher,
{
    async fn handle(&self, message: Message) -> Result<(), BusError> {
        self.process(&message.body).await.map_err(|err| BusError::Handler(err.to_string()))
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
