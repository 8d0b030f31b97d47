use super::{ClusterState, SchedulerClient};
use crate::config::SchedulerConfig;
use crate::job::ScheduleRequest;
use crate::{DockyardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the cluster scheduler.
#[derive(Debug, Clone)]
pub struct HttpSchedulerClient {
    client: Client,
    base_url: String,
}

impl HttpSchedulerClient {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        Self::with_url(&config.url, config.timeout_secs)
    }

    pub fn with_url(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                DockyardError::SchedulingError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SchedulerClient for HttpSchedulerClient {
    async fn submit(&self, request: &ScheduleRequest) -> Result<()> {
        let url = format!("{}/schedule", self.base_url);
        debug!("Submitting {} job(s) to scheduler", request.jobs().count());

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DockyardError::SchedulingError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DockyardError::SchedulingError(if body.trim().is_empty() {
            format!("Scheduler rejected request: {}", status)
        } else {
            format!("Scheduler rejected request ({}): {}", status, body.trim())
        }))
    }

    async fn cluster_state(&self) -> Result<ClusterState> {
        let url = format!("{}/cluster", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            DockyardError::SchedulingError(format!("Failed to fetch cluster state: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(DockyardError::SchedulingError(format!(
                "Failed to fetch cluster state: {}",
                response.status()
            )));
        }

        let mut state: ClusterState = response.json().await.map_err(|e| {
            DockyardError::SchedulingError(format!("Invalid cluster state: {}", e))
        })?;

        for (id, host) in state.iter_mut() {
            if host.id.is_empty() {
                host.id = id.clone();
            }
        }

        Ok(state)
    }
}
