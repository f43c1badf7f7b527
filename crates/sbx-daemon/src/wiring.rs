// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the concrete adapter set from `Config` and hands it to
//! `sbx_engine::Service::start`.

use std::time::Duration;

use sbx_adapters::agent::GrpcAgentAdapter;
use sbx_adapters::bus::{NsqPublisher, NsqSubscriber};
use sbx_adapters::hypervisor::{HypervisorError, LibvirtHypervisor};
use sbx_core::config::Config;
use sbx_engine::handler::HandlerConfig;
use sbx_engine::service::{Service, StartError};
use thiserror::Error;

type ConcreteService = Service<LibvirtHypervisor, GrpcAgentAdapter, NsqPublisher, NsqSubscriber>;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("failed to connect to hypervisor: {0}")]
    Connect(#[source] HypervisorError),

    #[error(transparent)]
    Start(#[from] StartError),
}

/// Connect to the hypervisor, build the NSQ publisher/subscriber, and start
/// the service. Returns a running-but-not-yet-consuming `Service`; call
/// `run` to begin handling messages.
pub async fn build_service(config: &Config) -> Result<ConcreteService, WiringError> {
    let hypervisor = LibvirtHypervisor::connect(&config.libvirt.network, &config.libvirt.address, config.libvirt.port)
        .map_err(WiringError::Connect)?;
    let agent = GrpcAgentAdapter;
    let publisher = NsqPublisher::new(config.producer.nsqd.clone());
    let subscriber = NsqSubscriber::new(
        config.consumer.lookupds.first().cloned().unwrap_or_default(),
    );

    let handler_config = HandlerConfig {
        shared_volume: config.shared_volume.clone().into(),
        snapshot_name: config.snapshot_name.clone(),
        agent_dest_dir: config.agent.dest_dir.clone(),
        deploy_timeout: Duration::from_millis(config.agent.deploy_timeout_ms),
        analyze_timeout: Duration::from_millis(config.agent.analyze_timeout_ms),
        output_topic: config.producer.topic.clone(),
    };

    let service = Service::start(
        hypervisor,
        agent,
        publisher,
        subscriber,
        &config.agent.package_name,
        handler_config,
        config.consumer.topic.clone(),
        config.consumer.channel.clone(),
    )
    .await?;

    Ok(service)
}
