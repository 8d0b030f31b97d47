use crate::agent::AgentClient;
use crate::config::ProbeConfig;
use crate::job::{port_number, JobState};
use crate::{DockyardError, Result};
use tracing::debug;

/// Port of the first exposed port spec, in declaration order.
///
/// A malformed first spec yields `None` rather than falling through to the
/// next one.
pub fn first_port(state: &JobState) -> Option<u16> {
    state.exposed_ports().first().and_then(port_number)
}

/// Poll the agent until `job_id` exposes a port.
///
/// Waits before every probe following the backoff schedule in `probe`.
/// A missing job or a job without ports is retried; any other agent error
/// aborts immediately.
pub async fn resolve_port(
    agent: &dyn AgentClient,
    job_id: &str,
    probe: &ProbeConfig,
) -> Result<u16> {
    let attempts = probe.max_attempts;

    for (attempt, delay) in probe.delays().enumerate() {
        tokio::time::sleep(delay).await;

        match agent.get_job(job_id).await {
            Ok(state) => {
                if let Some(port) = first_port(&state) {
                    debug!("Job {} exposes port {}", job_id, port);
                    return Ok(port);
                }
                debug!(
                    "Job {} exposes no port yet (probe {}/{})",
                    job_id,
                    attempt + 1,
                    attempts
                );
            }
            Err(e) if e.is_not_found() => {
                debug!(
                    "Job {} not visible yet (probe {}/{})",
                    job_id,
                    attempt + 1,
                    attempts
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(DockyardError::PortNotExposed(job_id.to_string()))
}
