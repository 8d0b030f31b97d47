use std::fmt;

/// Where a deployment run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Init,
    Resolving,
    Building,
    AwaitingBuild,
    StoppingPrevious,
    Deploying,
    ResolvingPort,
    Done,
    Failed,
}

impl DeployPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeployPhase::Init => "init",
            DeployPhase::Resolving => "resolving",
            DeployPhase::Building => "building",
            DeployPhase::AwaitingBuild => "awaiting_build",
            DeployPhase::StoppingPrevious => "stopping_previous",
            DeployPhase::Deploying => "deploying",
            DeployPhase::ResolvingPort => "resolving_port",
            DeployPhase::Done => "done",
            DeployPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a deployed service can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
