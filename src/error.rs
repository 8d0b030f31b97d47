use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockyardError {
    #[error("Service not discoverable: {0}")]
    NotDiscoverable(String),

    #[error("Discovery error: {0}")]
    DiscoveryError(String),

    #[error("No hosts available in cluster state")]
    NoHostsAvailable,

    #[error("Host not found in cluster state: {0}")]
    HostNotFound(String),

    #[error("Scheduling error: {0}")]
    SchedulingError(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Attach error: {0}")]
    AttachError(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Failed to stop job {job}: {reason}")]
    StopError { job: String, reason: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Job {0} exposes no port")]
    PortNotExposed(String),

    #[error("Build job {job} exited with status {code}")]
    BuildFailed { job: String, code: i32 },

    #[error("Invalid app name: {0}")]
    InvalidAppName(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DockyardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DockyardError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DockyardError>;
