//! Spec §8 end-to-end scenarios 4 and 5, plus the boundary behavior "any
//! failure inside the detonation steps still releases the VM".

use crate::support::{happy_body, Harness};
use sbx_engine::handler::HandlerError;

#[tokio::test]
async fn analyze_failure_releases_the_vm_and_publishes_nothing() {
    let h = Harness::with_pool_size(1);
    h.agent.fail_analyze("guest agent hung");

    let err = h.handler.process(&happy_body("abc123")).await.unwrap_err();

    assert!(matches!(err, HandlerError::Analyze(_)));
    assert!(h.publisher.published().is_empty(), "a failed job produces zero outbound messages");
    assert!(h.pool.acquire().is_some(), "the VM must be released even though detonation failed");
}

#[tokio::test]
async fn publish_failure_releases_the_vm_and_does_not_retry() {
    let h = Harness::with_pool_size(1);
    h.publisher.fail_publish("broker unreachable");

    let err = h.handler.process(&happy_body("abc123")).await.unwrap_err();

    assert!(matches!(err, HandlerError::Publish(_)));
    assert!(h.pool.acquire().is_some(), "the VM is released even when publish is the step that failed");
    assert!(h.publisher.published().is_empty(), "no outbound message survives a failed publish");
}

#[tokio::test]
async fn deploy_failure_releases_the_vm() {
    let h = Harness::with_pool_size(1);
    h.agent.fail_deploy("disk full");

    let err = h.handler.process(&happy_body("abc123")).await.unwrap_err();

    assert!(matches!(err, HandlerError::Deploy(_)));
    assert!(h.pool.acquire().is_some());
}

#[tokio::test]
async fn missing_sample_releases_the_vm() {
    let h = Harness::with_pool_size(1);
    let body = happy_body("sha-that-does-not-exist-on-disk");

    let err = h.handler.process(&body).await.unwrap_err();

    assert!(matches!(err, HandlerError::SampleRead(_)));
    assert!(h.pool.acquire().is_some());
}

#[tokio::test]
async fn empty_body_is_rejected_before_touching_the_pool() {
    let h = Harness::with_pool_size(1);

    let err = h.handler.process(&[]).await.unwrap_err();

    assert!(matches!(err, HandlerError::EmptyBody));
    assert!(h.publisher.published().is_empty());
    // The one VM was never claimed by the rejected job, so it's still free.
    assert!(h.pool.acquire().is_some());
}

#[tokio::test]
async fn malformed_json_is_rejected_without_acquiring_a_vm() {
    let h = Harness::with_pool_size(1);

    let err = h.handler.process(b"not json at all").await.unwrap_err();

    assert!(matches!(err, HandlerError::Decode(_)));
    assert!(h.pool.acquire().is_some());
}
