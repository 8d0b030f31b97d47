//! Service discovery: resolve a logical service name to one online address.

mod http_resolver;
mod static_resolver;

pub use http_resolver::HttpResolver;
pub use static_resolver::StaticResolver;

use crate::config::DiscoveryConfig;
use crate::{DockyardError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// One registered instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceInstance {
    pub addr: String,
    #[serde(default)]
    pub online: bool,
}

/// Backend-specific lookup of all known instances of a service.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn instances(&self, service: &str) -> Result<Vec<ServiceInstance>>;

    /// Pick one reachable address for `service`.
    ///
    /// The first online instance wins; an empty online set is an error.
    async fn resolve(&self, service: &str) -> Result<String> {
        let instances = self.instances(service).await?;
        pick_online(service, &instances)
    }
}

pub fn pick_online(service: &str, instances: &[ServiceInstance]) -> Result<String> {
    instances
        .iter()
        .find(|i| i.online && !i.addr.is_empty())
        .map(|i| i.addr.clone())
        .ok_or_else(|| DockyardError::NotDiscoverable(service.to_string()))
}

pub fn from_config(config: &DiscoveryConfig, timeout_secs: u64) -> Result<Arc<dyn Resolver>> {
    match config {
        DiscoveryConfig::Static { services } => Ok(Arc::new(StaticResolver::new(services.clone()))),
        DiscoveryConfig::Http { url } => Ok(Arc::new(HttpResolver::new(url, timeout_secs)?)),
    }
}
