// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guest-agent adapter: deploys the agent package and drives one analysis
//! over a `tonic` gRPC client, matching the original's own `agent/pkg/grpc`
//! client.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod proto {
    tonic::include_proto!("sandbox_agent");
}

use proto::sandbox_agent_client::SandboxAgentClient;
use proto::{AnalyzeRequest, DeployRequest};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to connect to guest agent at {0}: {1}")]
    Connect(String, String),

    #[error("deploy timed out after {0:?}")]
    DeployTimeout(Duration),

    #[error("deploy failed: {0}")]
    Deploy(String),

    #[error("analyze timed out after {0:?}")]
    AnalyzeTimeout(Duration),

    #[error("analyze failed: {0}")]
    Analyze(String),

    #[error("guest returned malformed result: {0}")]
    MalformedResult(#[source] serde_json::Error),
}

#[async_trait]
pub trait AgentAdapter: Send + Sync + 'static {
    /// The connected handle `deploy`/`analyze` operate on. One is opened per
    /// detonation and reused for both calls; there is no pooling across
    /// detonations.
    type Client: Send;

    /// Open the one client used for an entire detonation.
    async fn connect(&self, ip: &str) -> Result<Self::Client, AgentError>;

    /// Upload the immutable agent package to `dest_dir` inside the guest.
    /// Returns the version the agent advertises once deployed.
    async fn deploy(
        &self,
        client: &mut Self::Client,
        dest_dir: &str,
        package: &[u8],
        timeout: Duration,
    ) -> Result<String, AgentError>;

    /// Submit the sample and dynamic-analysis config, block until the guest
    /// completes analysis, and return the raw JSON result it reports.
    async fn analyze(
        &self,
        client: &mut Self::Client,
        dynamic_config: &[u8],
        sample: &[u8],
        timeout: Duration,
    ) -> Result<serde_json::Value, AgentError>;
}

/// Real adapter: one gRPC channel per detonation, dialed against `ip:4555`
/// (the guest agent's fixed listen port) and reused for both the deploy and
/// the analyze call.
#[derive(Clone, Copy, Default)]
pub struct GrpcAgentAdapter;

const AGENT_PORT: u16 = 4555;

#[async_trait]
impl AgentAdapter for GrpcAgentAdapter {
    type Client = SandboxAgentClient<tonic::transport::Channel>;

    async fn connect(&self, ip: &str) -> Result<Self::Client, AgentError> {
        let endpoint = format!("http://{ip}:{AGENT_PORT}");
        SandboxAgentClient::connect(endpoint.clone())
            .await
            .map_err(|e| AgentError::Connect(endpoint, e.to_string()))
    }

    async fn deploy(
        &self,
        client: &mut Self::Client,
        dest_dir: &str,
        package: &[u8],
        timeout: Duration,
    ) -> Result<String, AgentError> {
        let request = DeployRequest { dest_dir: dest_dir.to_string(), package: package.to_vec() };

        let response = tokio::time::timeout(timeout, client.deploy(request))
            .await
            .map_err(|_| AgentError::DeployTimeout(timeout))?
            .map_err(|status| AgentError::Deploy(status.message().to_string()))?;

        Ok(response.into_inner().version)
    }

    async fn analyze(
        &self,
        client: &mut Self::Client,
        dynamic_config: &[u8],
        sample: &[u8],
        timeout: Duration,
    ) -> Result<serde_json::Value, AgentError> {
        let request = AnalyzeRequest { dynamic_config: dynamic_config.to_vec(), sample: sample.to_vec() };

        let response = tokio::time::timeout(timeout, client.analyze(request))
            .await
            .map_err(|_| AgentError::AnalyzeTimeout(timeout))?
            .map_err(|status| AgentError::Analyze(status.message().to_string()))?;

        let result_json = response.into_inner().result_json;
        serde_json::from_slice(&result_json).map_err(AgentError::MalformedResult)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum AgentCall {
        Connect { ip: String },
        Deploy { ip: String, dest_dir: String },
        Analyze { ip: String },
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<AgentCall>,
        version: String,
        result: Option<serde_json::Value>,
        fail_connect: Option<String>,
        fail_deploy: Option<String>,
        fail_analyze: Option<String>,
    }

    /// In-memory guest-agent adapter for tests. Records every call; deploy
    /// and analyze outcomes are configured up front.
    #[derive(Clone)]
    pub struct FakeAgentAdapter {
        state: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeAgentAdapter {
        fn default() -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState {
                    version: "1.0.0".to_string(),
                    result: Some(serde_json::json!({"verdict": "clean"})),
                    ..Default::default()
                })),
            }
        }
    }

    impl FakeAgentAdapter {
        pub fn set_result(&self, result: serde_json::Value) {
            self.state.lock().result = Some(result);
        }

        pub fn fail_connect(&self, message: impl Into<String>) {
            self.state.lock().fail_connect = Some(message.into());
        }

        pub fn fail_deploy(&self, message: impl Into<String>) {
            self.state.lock().fail_deploy = Some(message.into());
        }

        pub fn fail_analyze(&self, message: impl Into<String>) {
            self.state.lock().fail_analyze = Some(message.into());
        }

        pub fn calls(&self) -> Vec<AgentCall> {
            self.state.lock().calls.clone()
        }
    }

    #[async_trait]
    impl AgentAdapter for FakeAgentAdapter {
        type Client = String;

        async fn connect(&self, ip: &str) -> Result<Self::Client, AgentError> {
            let mut state = self.state.lock();
            state.calls.push(AgentCall::Connect { ip: ip.to_string() });
            if let Some(message) = state.fail_connect.clone() {
                return Err(AgentError::Connect(ip.to_string(), message));
            }
            Ok(ip.to_string())
        }

        async fn deploy(
            &self,
            client: &mut Self::Client,
            dest_dir: &str,
            _package: &[u8],
            _timeout: Duration,
        ) -> Result<String, AgentError> {
            let mut state = self.state.lock();
            state.calls.push(AgentCall::Deploy { ip: client.clone(), dest_dir: dest_dir.to_string() });
            if let Some(message) = state.fail_deploy.clone() {
                return Err(AgentError::Deploy(message));
            }
            Ok(state.version.clone())
        }

        async fn analyze(
            &self,
            client: &mut Self::Client,
            _dynamic_config: &[u8],
            _sample: &[u8],
            _timeout: Duration,
        ) -> Result<serde_json::Value, AgentError> {
            let mut state = self.state.lock();
            state.calls.push(AgentCall::Analyze { ip: client.clone() });
            if let Some(message) = state.fail_analyze.clone() {
                return Err(AgentError::Analyze(message));
            }
            Ok(state.result.clone().unwrap_or(serde_json::Value::Null))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{AgentCall, FakeAgentAdapter};

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
