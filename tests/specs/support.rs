use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::hypervisor::{Domain, FakeHypervisorAdapter};
use sbx_adapters::{FakeAgentAdapter, FakeBusPublisher};
use sbx_core::domain::DomainHandle;
use sbx_core::domain::Vm;
use sbx_engine::handler::{HandlerConfig, JobHandler};
use sbx_engine::pool::VmPool;
use tempfile::TempDir;

pub type Handler = JobHandler<FakeHypervisorAdapter, FakeAgentAdapter, FakeBusPublisher>;

/// A fully-wired handler plus the fakes and pool backing it, so scenario
/// tests can both drive `process` and assert on adapter call history and
/// pool state afterward.
pub struct Harness {
    pub handler: Handler,
    pub pool: Arc<VmPool>,
    pub hypervisor: FakeHypervisorAdapter,
    pub agent: FakeAgentAdapter,
    pub publisher: FakeBusPublisher,
    pub _sample_dir: TempDir,
}

impl Harness {
    pub fn with_pool_size(pool_size: usize) -> Self {
        let sample_dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(sample_dir.path().join("abc123"), b"sample-bytes").expect("write sample");

        let vms: Vec<Vm> = (0..pool_size as i32)
            .map(|i| Vm::new(i, format!("vm-{i}"), format!("10.0.0.{i}"), DomainHandle(i)))
            .collect();
        let pool = Arc::new(VmPool::new(vms));

        let hypervisor = FakeHypervisorAdapter::new(vec![Domain {
            dom_handle: DomainHandle(0),
            ip: "10.0.0.0".to_string(),
            snapshot_names: vec!["clean".to_string()],
        }]);
        let agent = FakeAgentAdapter::default();
        let publisher = FakeBusPublisher::default();

        let handler = JobHandler::new(
            pool.clone(),
            Arc::new(hypervisor.clone()),
            Arc::new(agent.clone()),
            Arc::new(publisher.clone()),
            Arc::from(b"package-bytes".to_vec()),
            HandlerConfig {
                shared_volume: sample_dir.path().to_path_buf(),
                snapshot_name: "clean".to_string(),
                agent_dest_dir: "/opt/agent".to_string(),
                deploy_timeout: Duration::from_secs(1),
                analyze_timeout: Duration::from_secs(1),
                output_topic: "scan-results".to_string(),
            },
        );

        Self { handler, pool, hypervisor, agent, publisher, _sample_dir: sample_dir }
    }
}

pub fn happy_body(sha256: &str) -> Vec<u8> {
    format!(r#"{{"sha256":"{sha256}","dynamic":{{"timeout":60}}}}"#).into_bytes()
}
