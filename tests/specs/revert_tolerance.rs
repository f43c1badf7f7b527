//! Spec §8 end-to-end scenario 6: a revert error does not abort the job.

use sbx_core::domain::DomainHandle;

use crate::support::{happy_body, Harness};

#[tokio::test]
async fn revert_failure_is_logged_and_detonation_still_publishes() {
    let h = Harness::with_pool_size(1);
    h.hypervisor.fail_revert_for(DomainHandle(0));

    h.handler.process(&happy_body("abc123")).await.expect("revert failure must not abort the job");

    assert_eq!(h.publisher.published().len(), 1, "the job still completes and publishes normally");
    assert_eq!(h.hypervisor.reverts().len(), 1, "revert was attempted exactly once");
    assert!(h.pool.acquire().is_some());
}
