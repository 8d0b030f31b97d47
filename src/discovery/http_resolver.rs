use super::{Resolver, ServiceInstance};
use crate::{DockyardError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// Resolver that queries an HTTP discovery registry.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    base_url: Url,
}

impl HttpResolver {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DockyardError::DiscoveryError(format!("Failed to build client: {}", e)))?;

        let base_url = Url::parse(url)
            .map_err(|e| DockyardError::DiscoveryError(format!("Invalid URL {}: {}", url, e)))?;

        Ok(Self { client, base_url })
    }

    fn service_url(&self, service: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DockyardError::DiscoveryError(format!("Not a base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("services")
            .push(service);
        Ok(url)
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn instances(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        let url = self.service_url(service)?;
        debug!("Looking up service {} at {}", service, url);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            DockyardError::DiscoveryError(format!("Failed to query {}: {}", url, e))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DockyardError::NotDiscoverable(service.to_string())),
            status if status.is_success() => response.json().await.map_err(|e| {
                DockyardError::DiscoveryError(format!("Invalid response for {}: {}", service, e))
            }),
            status => Err(DockyardError::DiscoveryError(format!(
                "Lookup of {} failed: {}",
                service, status
            ))),
        }
    }
}
