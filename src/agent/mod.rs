//! Host agent boundary.
//!
//! An agent supervises the jobs placed on one host. Clients are scoped to a
//! single host and obtained through an [`AgentConnector`] once the target
//! host has been chosen from cluster state.

pub mod attach;
pub mod client;

pub use attach::{AttachFlags, AttachSession, AttachStream, BoxedStream};
pub use client::{HttpAgentClient, HttpAgentConnector};

use crate::job::JobState;
use crate::scheduler::HostInfo;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Fails with `NotFound` when the agent has no such job.
    async fn get_job(&self, job_id: &str) -> Result<JobState>;

    async fn stop_job(&self, job_id: &str) -> Result<()>;

    /// Open a stdio stream to `job_id`.
    ///
    /// With `wait_for_start` the job does not need to exist yet; the
    /// returned session becomes usable once it starts.
    async fn attach(
        &self,
        job_id: &str,
        flags: AttachFlags,
        wait_for_start: bool,
    ) -> Result<AttachSession>;
}

pub trait AgentConnector: Send + Sync {
    fn connect(&self, host: &HostInfo) -> Result<Arc<dyn AgentClient>>;
}
