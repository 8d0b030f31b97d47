use super::{ClusterState, HostInfo};
use crate::{DockyardError, Result};
use serde::Deserialize;

/// How the target host is chosen from cluster state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Placement {
    /// Lowest host id present. Only meaningful for single-host fleets.
    #[default]
    First,
    /// A specific host.
    Host { id: String },
}

impl Placement {
    pub fn select(&self, state: &ClusterState) -> Result<HostInfo> {
        if state.is_empty() {
            return Err(DockyardError::NoHostsAvailable);
        }

        match self {
            Placement::First => state
                .values()
                .next()
                .cloned()
                .ok_or(DockyardError::NoHostsAvailable),
            Placement::Host { id } => state
                .get(id)
                .cloned()
                .ok_or_else(|| DockyardError::HostNotFound(id.clone())),
        }
    }
}
