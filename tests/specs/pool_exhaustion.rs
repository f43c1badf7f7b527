//! Spec §8 end-to-end scenario 3: pool exhaustion under concurrent dispatch,
//! and invariant 1 (no two concurrent acquires return the same VM).

use std::sync::Arc;

use crate::support::{happy_body, Harness};
use sbx_engine::handler::HandlerError;

#[tokio::test]
async fn exactly_pool_size_jobs_proceed_when_more_are_dispatched_at_once() {
    let h = Arc::new(Harness::with_pool_size(2));

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move { h.handler.process(&happy_body("abc123")).await }));
    }

    let mut ok = 0;
    let mut no_free_vm = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(()) => ok += 1,
            Err(HandlerError::NoFreeVm) => no_free_vm += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 2, "only as many jobs as there are VMs may proceed to detonation");
    assert_eq!(no_free_vm, 1, "the third concurrent job must nack with \"no free VM\"");
    assert_eq!(h.publisher.published().len(), 2);
}

#[tokio::test]
async fn pool_exhaustion_acquires_nothing_and_mutates_no_state() {
    let h = Harness::with_pool_size(0);

    let err = h.handler.process(&happy_body("abc123")).await.unwrap_err();

    assert!(matches!(err, HandlerError::NoFreeVm));
    assert!(h.publisher.published().is_empty());
    assert_eq!(h.pool.len(), 0);
}
