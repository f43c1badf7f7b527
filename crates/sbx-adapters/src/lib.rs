// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-adapters: one module per external collaborator the sandbox service
//! talks to — the hypervisor, the guest agent, and the message bus. Each
//! module exposes a trait plus a real implementation; under the
//! `test-support` feature (or in this crate's own tests) it also exposes an
//! in-memory fake of that same trait.

pub mod agent;
pub mod bus;
pub mod hypervisor;

pub use agent::{AgentAdapter, AgentError, GrpcAgentAdapter};
pub use bus::{BusError, BusPublisher, BusSubscriber, Message, MessageHandler, NsqPublisher, NsqSubscriber};
pub use hypervisor::{Domain, HypervisorAdapter, HypervisorError, LibvirtHypervisor};

#[cfg(any(test, feature = "test-support"))]
pub use agent::FakeAgentAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use bus::{FakeBusPublisher, FakeBusSubscriber};
#[cfg(any(test, feature = "test-support"))]
pub use hypervisor::FakeHypervisorAdapter;
