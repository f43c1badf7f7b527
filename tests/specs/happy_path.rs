//! Spec §8 end-to-end scenario 1: happy path.

use crate::support::{happy_body, Harness};

#[tokio::test]
async fn one_job_through_one_vm_publishes_one_message_and_frees_the_vm() {
    let h = Harness::with_pool_size(1);
    h.agent.set_result(serde_json::json!({"verdict": "clean"}));

    h.handler.process(&happy_body("abc123")).await.expect("job should succeed");

    let published = h.publisher.published();
    assert_eq!(published.len(), 1, "exactly one outbound message for a successful job");

    let (topic, body) = &published[0];
    assert_eq!(topic, "scan-results");

    let envelope: serde_json::Value = serde_json::from_slice(body).expect("valid json envelope");
    assert_eq!(envelope["sha256"], "abc123", "outbound sha256 must echo the inbound job");
    let payload = envelope["payload"].as_array().expect("payload array");
    assert_eq!(payload.len(), 1, "exactly one payload entry");
    assert_eq!(payload[0]["module"], "sandbox");

    let result_body: Vec<u8> = serde_json::from_value(payload[0]["body"].clone()).unwrap();
    let result: sbx_core::domain::ScanResult = serde_json::from_slice(&result_body).unwrap();
    assert_eq!(result.res, serde_json::json!({"verdict": "clean"}));
    assert_eq!(result.version, "1.0.0");

    assert!(h.pool.acquire().is_some(), "VM must be free again once the job is done");
}

#[tokio::test]
async fn sandbox_module_deploys_before_analyzing() {
    let h = Harness::with_pool_size(1);
    h.handler.process(&happy_body("abc123")).await.expect("job should succeed");

    let calls = h.agent.calls();
    assert!(matches!(calls[0], sbx_adapters::agent::AgentCall::Deploy { .. }), "deploy precedes analyze");
    assert!(matches!(calls[1], sbx_adapters::agent::AgentCall::Analyze { .. }));
}
