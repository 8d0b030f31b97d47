use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A job as submitted to the scheduler and reported back by host agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Config")]
    pub config: RuntimeConfig,

    #[serde(rename = "TCPPorts", default)]
    pub tcp_ports: u32,
}

impl JobSpec {
    pub fn new(id: impl Into<String>, config: RuntimeConfig) -> Self {
        Self {
            id: id.into(),
            config,
            tcp_ports: 0,
        }
    }

    pub fn with_tcp_ports(mut self, count: u32) -> Self {
        self.tcp_ports = count;
        self
    }
}

/// Container runtime configuration carried opaquely by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeConfig {
    pub image: String,

    #[serde(default)]
    pub cmd: Vec<String>,

    #[serde(default)]
    pub env: Vec<String>,

    #[serde(default)]
    pub tty: bool,

    #[serde(default)]
    pub attach_stdin: bool,

    #[serde(default)]
    pub attach_stdout: bool,

    #[serde(default)]
    pub attach_stderr: bool,

    #[serde(default)]
    pub open_stdin: bool,

    #[serde(default)]
    pub stdin_once: bool,

    #[serde(default, skip_serializing_if = "ExposedPorts::is_empty")]
    pub exposed_ports: ExposedPorts,
}

impl RuntimeConfig {
    pub fn new(image: impl Into<String>, cmd: Vec<String>) -> Self {
        Self {
            image: image.into(),
            cmd,
            ..Default::default()
        }
    }

    /// Attach every stdio direction; stdin stays open for a single writer.
    pub fn interactive(mut self) -> Self {
        self.attach_stdin = true;
        self.attach_stdout = true;
        self.attach_stderr = true;
        self.open_stdin = true;
        self.stdin_once = true;
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{}={}", key, value));
        self
    }
}

/// Port specs such as `8080/tcp`, kept in the order the runtime declared them.
///
/// On the wire this is an object keyed by port spec with empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposedPorts(Vec<String>);

impl ExposedPorts {
    pub fn new(specs: Vec<String>) -> Self {
        Self(specs)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Serialize for ExposedPorts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for spec in &self.0 {
            map.serialize_entry(spec, &BTreeMap::<String, String>::new())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExposedPorts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortsVisitor;

        impl<'de> Visitor<'de> for PortsVisitor {
            type Value = ExposedPorts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by port spec")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ExposedPorts::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ExposedPorts::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut specs = Vec::new();
                while let Some((spec, _)) = access.next_entry::<String, IgnoredAny>()? {
                    specs.push(spec);
                }
                Ok(ExposedPorts(specs))
            }
        }

        deserializer.deserialize_any(PortsVisitor)
    }
}

/// Extract the port number from a spec like `8080/tcp`.
pub fn port_number(spec: &str) -> Option<u16> {
    spec.split('/').next()?.trim().parse().ok()
}

/// Incremental placement request: adds jobs to hosts, never replaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    #[serde(rename = "Incremental")]
    incremental: bool,

    #[serde(rename = "HostJobs")]
    host_jobs: BTreeMap<String, Vec<JobSpec>>,
}

impl ScheduleRequest {
    pub fn incremental(host_id: impl Into<String>, jobs: Vec<JobSpec>) -> Self {
        let mut host_jobs = BTreeMap::new();
        host_jobs.insert(host_id.into(), jobs);
        Self {
            incremental: true,
            host_jobs,
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    pub fn host_jobs(&self) -> &BTreeMap<String, Vec<JobSpec>> {
        &self.host_jobs
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobSpec> {
        self.host_jobs.values().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Running,
    Done,
    Crashed,
    Failed,
}

impl JobStatus {
    pub const fn is_live(&self) -> bool {
        matches!(self, JobStatus::Starting | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Crashed => write!(f, "crashed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A job as observed on a host agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(rename = "Job")]
    pub job: JobSpec,

    #[serde(rename = "Status")]
    pub status: JobStatus,

    #[serde(rename = "ExitCode", default)]
    pub exit_code: Option<i32>,
}

impl JobState {
    pub fn id(&self) -> &str {
        &self.job.id
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn exposed_ports(&self) -> &ExposedPorts {
        &self.job.config.exposed_ports
    }
}
