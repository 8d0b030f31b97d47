use super::attach::{handshake, AttachFlags, AttachSession};
use super::{AgentClient, AgentConnector};
use crate::config::AgentConfig;
use crate::job::JobState;
use crate::scheduler::HostInfo;
use crate::{DockyardError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Client for one host's agent: an HTTP job API plus a raw attach listener.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: Client,
    base_url: Url,
    attach_addr: String,
}

impl HttpAgentClient {
    pub fn new(base_url: &str, attach_addr: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DockyardError::AgentError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url).map_err(|e| {
            DockyardError::AgentError(format!("Invalid agent URL {}: {}", base_url, e))
        })?;

        Ok(Self {
            client,
            base_url,
            attach_addr: attach_addr.into(),
        })
    }

    fn job_url(&self, job_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DockyardError::AgentError(format!("Not a base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("jobs")
            .push(job_id);
        Ok(url)
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn get_job(&self, job_id: &str) -> Result<JobState> {
        let url = self.job_url(job_id)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            DockyardError::AgentError(format!("Failed to get job {}: {}", job_id, e))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DockyardError::NotFound(job_id.to_string())),
            status if status.is_success() => response.json().await.map_err(|e| {
                DockyardError::AgentError(format!("Invalid state for job {}: {}", job_id, e))
            }),
            status => Err(DockyardError::AgentError(format!(
                "Failed to get job {}: {}",
                job_id, status
            ))),
        }
    }

    async fn stop_job(&self, job_id: &str) -> Result<()> {
        let url = self.job_url(job_id)?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| DockyardError::StopError {
                job: job_id.to_string(),
                reason: e.to_string(),
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DockyardError::NotFound(job_id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(DockyardError::StopError {
                job: job_id.to_string(),
                reason: status.to_string(),
            }),
        }
    }

    async fn attach(
        &self,
        job_id: &str,
        flags: AttachFlags,
        wait_for_start: bool,
    ) -> Result<AttachSession> {
        debug!("Attaching to {} via {}", job_id, self.attach_addr);

        let stream = TcpStream::connect(&self.attach_addr).await.map_err(|e| {
            DockyardError::AttachError(format!(
                "Failed to connect to {}: {}",
                self.attach_addr, e
            ))
        })?;
        stream.set_nodelay(true)?;

        handshake(stream, job_id, flags, wait_for_start).await
    }
}

/// Builds [`HttpAgentClient`]s from the host's advertised address.
#[derive(Debug, Clone)]
pub struct HttpAgentConnector {
    config: AgentConfig,
}

impl HttpAgentConnector {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

impl AgentConnector for HttpAgentConnector {
    fn connect(&self, host: &HostInfo) -> Result<Arc<dyn AgentClient>> {
        let address = if host.address.is_empty() {
            &host.id
        } else {
            &host.address
        };

        let base_url = format!("http://{}:{}", address, self.config.port);
        let attach_addr = format!("{}:{}", address, self.config.attach_port);
        debug!("Connecting to agent on {} at {}", host.id, base_url);

        let client = HttpAgentClient::new(&base_url, attach_addr, self.config.timeout_secs)?;
        Ok(Arc::new(client))
    }
}
