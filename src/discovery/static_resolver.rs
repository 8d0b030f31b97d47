use super::{Resolver, ServiceInstance};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Resolver backed by a fixed service table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    services: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    pub fn new(services: HashMap<String, Vec<String>>) -> Self {
        Self { services }
    }

    pub fn single(service: impl Into<String>, addr: impl Into<String>) -> Self {
        let mut services = HashMap::new();
        services.insert(service.into(), vec![addr.into()]);
        Self { services }
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn instances(&self, service: &str) -> Result<Vec<ServiceInstance>> {
        Ok(self
            .services
            .get(service)
            .map(|addrs| {
                addrs
                    .iter()
                    .map(|addr| ServiceInstance {
                        addr: addr.clone(),
                        online: true,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
