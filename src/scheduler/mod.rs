pub mod client;
pub mod placement;

pub use client::HttpSchedulerClient;
pub use placement::Placement;

use crate::job::ScheduleRequest;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(rename = "ID", default)]
    pub id: String,

    /// Address other machines use to reach this host.
    #[serde(rename = "Address", default)]
    pub address: String,
}

impl HostInfo {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

/// Host id to host info, ordered by id.
pub type ClusterState = BTreeMap<String, HostInfo>;

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Returns once the scheduler accepted placement, not once jobs run.
    async fn submit(&self, request: &ScheduleRequest) -> Result<()>;

    async fn cluster_state(&self) -> Result<ClusterState>;
}
