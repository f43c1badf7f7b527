// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message bus adapter: publishes and subscribes against NSQ, speaking its
//! documented wire protocols directly over `tokio` rather than depending on
//! an unverified third-party NSQ client crate.

mod nsq;
mod wire;

use async_trait::async_trait;
use thiserror::Error;

pub use nsq::{NsqPublisher, NsqSubscriber};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to resolve producer for topic {0} via {1}: {2}")]
    Lookup(String, String, String),

    #[error("failed to connect to {0}: {1}")]
    Connect(String, String),

    #[error("publish to {0} failed: {1}")]
    Publish(String, String),

    #[error("subscribe protocol error: {0}")]
    Protocol(String),

    #[error("handler failed: {0}")]
    Handler(String),
}

/// Fire-and-forget from the caller's perspective, but the call does not
/// return success until the broker has confirmed acceptance.
#[async_trait]
pub trait BusPublisher: Send + Sync + 'static {
    async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), BusError>;
}

/// One inbound message. `finish`/`requeue` report the handler's outcome back
/// to the broker (ack/nack); the subscriber implementation is responsible
/// for issuing `FIN`/`REQ` in response.
pub struct Message {
    pub body: Vec<u8>,
}

/// Invoked once per delivered message, bounded to `concurrency` concurrent
/// invocations by the subscriber.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: Message) -> Result<(), BusError>;
}

#[async_trait]
pub trait BusSubscriber: Send + Sync + 'static {
    /// Deliver messages from `topic`/`channel` to `handler` until
    /// `shutdown` is cancelled. At most `concurrency` invocations of
    /// `handler` run at once; the tying of this value to the VM pool size
    /// is the caller's responsibility (see `sbx-engine::service`).
    ///
    /// On cancellation, in-flight `handler` invocations are drained before
    /// this call returns — no acks are dropped for messages whose handler
    /// already completed.
    async fn subscribe(
        &self,
        topic: &str,
        channel: &str,
        concurrency: usize,
        handler: std::sync::Arc<dyn MessageHandler>,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> Result<(), BusError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeState {
        published: Vec<(String, Vec<u8>)>,
        fail_publish: Option<String>,
    }

    /// In-memory publisher for tests. Records every call.
    #[derive(Clone, Default)]
    pub struct FakeBusPublisher {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeBusPublisher {
        pub fn fail_publish(&self, message: impl Into<String>) {
            self.state.lock().fail_publish = Some(message.into());
        }

        pub fn published(&self) -> Vec<(String, Vec<u8>)> {
            self.state.lock().published.clone()
        }
    }

    #[async_trait]
    impl BusPublisher for FakeBusPublisher {
        async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), BusError> {
            let mut state = self.state.lock();
            if let Some(message) = state.fail_publish.clone() {
                return Err(BusError::Publish(topic.to_string(), message));
            }
            state.published.push((topic.to_string(), body.to_vec()));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake_subscriber {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    use super::*;

    /// Delivers a fixed, pre-loaded batch of messages with bounded
    /// concurrency, then returns — standing in for a live NSQ topic in
    /// tests of the pool-exhaustion and bounded-parallelism invariants.
    /// `peak_concurrency` reports the highest number of simultaneously
    /// in-flight handler invocations observed across the run.
    #[derive(Clone, Default)]
    pub struct FakeBusSubscriber {
        messages: Vec<Vec<u8>>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl FakeBusSubscriber {
        pub fn new(messages: Vec<Vec<u8>>) -> Self {
            Self { messages, ..Default::default() }
        }

        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BusSubscriber for FakeBusSubscriber {
        async fn subscribe(
            &self,
            _topic: &str,
            _channel: &str,
            concurrency: usize,
            handler: Arc<dyn MessageHandler>,
            _shutdown: CancellationToken,
        ) -> Result<(), BusError> {
            let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

            let mut tasks = Vec::with_capacity(self.messages.len());
            for body in self.messages.clone() {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let handler = handler.clone();
                let in_flight = self.in_flight.clone();
                let peak = self.peak.clone();
                tasks.push(tokio::spawn(async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let result = handler.handle(Message { body }).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                    result
                }));
            }
            for task in tasks {
                let _ = task.await;
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBusPublisher;
#[cfg(any(test, feature = "test-support"))]
pub use fake_subscriber::FakeBusSubscriber;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
