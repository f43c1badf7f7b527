//! Spec §4.F service lifecycle and invariant 3 (bounded parallelism), driven
//! through the public `Service` API rather than `sbx-engine`'s own
//! in-crate tests.

use std::time::Duration;

use sbx_adapters::hypervisor::{Domain, FakeHypervisorAdapter};
use sbx_adapters::{FakeAgentAdapter, FakeBusPublisher, FakeBusSubscriber};
use sbx_core::domain::DomainHandle;
use sbx_engine::handler::HandlerConfig;
use sbx_engine::service::{Service, StartError};
use tempfile::tempdir;

fn domains(n: usize) -> Vec<Domain> {
    (0..n as i32)
        .map(|i| Domain { dom_handle: DomainHandle(i), ip: format!("10.0.0.{i}"), snapshot_names: vec!["clean".into()] })
        .collect()
}

fn handler_config(shared_volume: impl Into<std::path::PathBuf>) -> HandlerConfig {
    HandlerConfig {
        shared_volume: shared_volume.into(),
        snapshot_name: "clean".to_string(),
        agent_dest_dir: "/opt/agent".to_string(),
        deploy_timeout: Duration::from_secs(1),
        analyze_timeout: Duration::from_secs(1),
        output_topic: "scan-results".to_string(),
    }
}

#[tokio::test]
async fn service_binds_subscriber_concurrency_to_the_enumerated_pool_size() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("agent.tar.gz"), b"package-bytes").unwrap();
    std::fs::write(dir.path().join("abc123"), b"sample-bytes").unwrap();

    let bodies: Vec<Vec<u8>> = (0..10).map(|_| crate::support::happy_body("abc123")).collect();
    let subscriber = FakeBusSubscriber::new(bodies);

    let service = Service::start(
        FakeHypervisorAdapter::new(domains(3)),
        FakeAgentAdapter::default(),
        FakeBusPublisher::default(),
        subscriber.clone(),
        dir.path().join("agent.tar.gz"),
        handler_config(dir.path()),
        "file-scans".to_string(),
        "sandbox".to_string(),
    )
    .await
    .unwrap();

    assert_eq!(service.pool_size(), 3);
    service.run().await.unwrap();

    assert!(
        subscriber.peak_concurrency() <= 3,
        "no more than pool_size handler invocations may run at once"
    );
}

#[tokio::test]
async fn startup_fails_fast_when_the_hypervisor_has_no_domains() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("agent.tar.gz"), b"package-bytes").unwrap();

    let err = Service::start(
        FakeHypervisorAdapter::new(Vec::new()),
        FakeAgentAdapter::default(),
        FakeBusPublisher::default(),
        FakeBusSubscriber::new(Vec::new()),
        dir.path().join("agent.tar.gz"),
        handler_config(dir.path()),
        "file-scans".to_string(),
        "sandbox".to_string(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StartError::EmptyPool));
}

#[tokio::test]
async fn startup_fails_fast_when_the_agent_package_is_missing() {
    let dir = tempdir().unwrap();

    let err = Service::start(
        FakeHypervisorAdapter::new(domains(1)),
        FakeAgentAdapter::default(),
        FakeBusPublisher::default(),
        FakeBusSubscriber::new(Vec::new()),
        dir.path().join("does-not-exist.tar.gz"),
        handler_config(dir.path()),
        "file-scans".to_string(),
        "sandbox".to_string(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StartError::ReadPackage(..)));
}
