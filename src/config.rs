//! Configuration loading.
//!
//! Every section has defaults, so a missing file or a partial file yields a
//! usable configuration pointing at a local single-host fleet.

use crate::scheduler::Placement;
use crate::{DockyardError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockyardConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub placement: Placement,

    #[serde(default)]
    pub deploy: DeployConfig,
}

/// Where service addresses come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryConfig {
    /// Fixed name to address mapping; every listed address counts as online.
    Static {
        #[serde(default)]
        services: HashMap<String, Vec<String>>,
    },
    /// HTTP discovery registry.
    Http { url: String },
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig::Http {
            url: "http://127.0.0.1:1111".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            url: default_scheduler_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Port of the agent's HTTP job API.
    #[serde(default = "default_agent_port")]
    pub port: u16,

    /// Port of the agent's raw attach listener.
    #[serde(default = "default_attach_port")]
    pub attach_port: u16,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: default_agent_port(),
            attach_port: default_attach_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Discovery name of the artifact store.
    #[serde(default = "default_artifact_service")]
    pub artifact_service: String,

    #[serde(default = "default_build_image")]
    pub build_image: String,

    #[serde(default = "default_service_image")]
    pub service_image: String,

    #[serde(default = "default_service_command")]
    pub service_command: Vec<String>,

    /// Host part of the reported endpoint. Defaults to the host's advertised address.
    #[serde(default)]
    pub public_address: Option<String>,

    /// Root under which a working directory is created per app.
    #[serde(default)]
    pub apps_root: Option<PathBuf>,

    #[serde(default)]
    pub port_probe: ProbeConfig,

    /// Re-queries of a build job that is still live after its stream closed.
    #[serde(default = "default_exit_probe")]
    pub exit_probe: ProbeConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifact_service: default_artifact_service(),
            build_image: default_build_image(),
            service_image: default_service_image(),
            service_command: default_service_command(),
            public_address: None,
            apps_root: None,
            port_probe: ProbeConfig::default(),
            exit_probe: default_exit_probe(),
        }
    }
}

/// Upper bound on `max_attempts` for any probe.
pub const MAX_PROBE_ATTEMPTS: u32 = 1000;

/// Backoff schedule for polling an agent until a job reaches some state.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl ProbeConfig {
    /// Delay to wait before each probe, in order. Yields `max_attempts` items.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let cap = self.max_delay_ms as f64;
        let factor = self.backoff_factor;
        let mut current = self.initial_delay_ms as f64;

        (0..self.max_attempts).map(move |_| {
            let ms = current.min(cap) as u64;
            current = (current * factor).min(cap);
            Duration::from_millis(ms)
        })
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.max_attempts == 0 || self.max_attempts > MAX_PROBE_ATTEMPTS {
            return Err(DockyardError::ConfigError(format!(
                "deploy.{}.max_attempts must be between 1 and {}, got {}",
                section, MAX_PROBE_ATTEMPTS, self.max_attempts
            )));
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return Err(DockyardError::ConfigError(format!(
                "deploy.{}.backoff_factor must be >= 1.0, got {}",
                section, self.backoff_factor
            )));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_attempts: default_max_attempts(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_scheduler_url() -> String {
    "http://127.0.0.1:1112".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_agent_port() -> u16 {
    1113
}

fn default_attach_port() -> u16 {
    1114
}

fn default_artifact_service() -> String {
    "shelf".to_string()
}

fn default_build_image() -> String {
    "flynn/slugbuilder".to_string()
}

fn default_service_image() -> String {
    "flynn/slugrunner".to_string()
}

fn default_service_command() -> Vec<String> {
    vec!["start".to_string(), "web".to_string()]
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_exit_probe() -> ProbeConfig {
    ProbeConfig {
        initial_delay_ms: 200,
        max_attempts: 10,
        backoff_factor: 2.0,
        max_delay_ms: 2000,
    }
}

impl DockyardConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DockyardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| DockyardError::ConfigError(format!("Invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|e| {
            DockyardError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Load from `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                debug!("No configuration file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let DiscoveryConfig::Http { url } = &self.discovery {
            if url.trim().is_empty() {
                return Err(DockyardError::ConfigError(
                    "discovery.url must not be empty".to_string(),
                ));
            }
        }

        if self.scheduler.url.trim().is_empty() {
            return Err(DockyardError::ConfigError(
                "scheduler.url must not be empty".to_string(),
            ));
        }

        if self.agent.port == 0 || self.agent.attach_port == 0 {
            return Err(DockyardError::ConfigError(
                "agent ports must be non-zero".to_string(),
            ));
        }

        if self.deploy.artifact_service.trim().is_empty() {
            return Err(DockyardError::ConfigError(
                "deploy.artifact_service must not be empty".to_string(),
            ));
        }

        if self.deploy.service_command.is_empty() {
            return Err(DockyardError::ConfigError(
                "deploy.service_command must not be empty".to_string(),
            ));
        }

        self.deploy.port_probe.validate("port_probe")?;
        self.deploy.exit_probe.validate("exit_probe")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DockyardConfig::default();

        assert_eq!(config.scheduler.url, "http://127.0.0.1:1112");
        assert_eq!(config.agent.port, 1113);
        assert_eq!(config.deploy.artifact_service, "shelf");
        assert_eq!(config.deploy.service_command, vec!["start", "web"]);
        assert_eq!(config.placement, Placement::First);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
discovery:
  type: static
  services:
    shelf: ["store.local:9999"]
placement:
  strategy: host
  id: host-b
deploy:
  public_address: 10.0.2.15
  port_probe:
    initial_delay_ms: 10
"#;
        let config = DockyardConfig::from_yaml_str(yaml).unwrap();

        match &config.discovery {
            DiscoveryConfig::Static { services } => {
                assert_eq!(services["shelf"], vec!["store.local:9999"]);
            }
            other => panic!("Expected static discovery, got {:?}", other),
        }
        assert_eq!(config.placement, Placement::Host { id: "host-b".into() });
        assert_eq!(config.deploy.public_address.as_deref(), Some("10.0.2.15"));
        assert_eq!(config.deploy.port_probe.initial_delay_ms, 10);
        assert_eq!(config.deploy.port_probe.max_attempts, 10);
        assert_eq!(config.deploy.build_image, "flynn/slugbuilder");
    }

    #[test]
    fn test_invalid_probe_rejected() {
        let yaml = "deploy:\n  port_probe:\n    max_attempts: 0\n";
        assert!(DockyardConfig::from_yaml_str(yaml).is_err());

        let yaml = "deploy:\n  port_probe:\n    backoff_factor: 0.5\n";
        assert!(DockyardConfig::from_yaml_str(yaml).is_err());

        let yaml = "deploy:\n  exit_probe:\n    max_attempts: 4294967295\n";
        let err = DockyardConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("exit_probe.max_attempts"));
    }

    #[test]
    fn test_delays_are_lazy() {
        let probe = ProbeConfig {
            initial_delay_ms: 1,
            max_attempts: u32::MAX,
            backoff_factor: 2.0,
            max_delay_ms: 50,
        };

        let delays: Vec<u64> = probe.delays().take(8).map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 50, 50]);
    }

    #[test]
    fn test_exit_probe_defaults() {
        let config = DockyardConfig::default();
        assert_eq!(config.deploy.exit_probe.initial_delay_ms, 200);
        assert_eq!(config.deploy.exit_probe.max_delay_ms, 2000);
    }

    #[test]
    fn test_probe_delays_back_off_and_cap() {
        let probe = ProbeConfig {
            initial_delay_ms: 1000,
            max_attempts: 5,
            backoff_factor: 2.0,
            max_delay_ms: 5000,
        };

        let delays: Vec<u64> = probe.delays().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  url: http://sched:1112\n  timeout_secs: 3").unwrap();

        let config = DockyardConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.scheduler.url, "http://sched:1112");
        assert_eq!(config.scheduler.timeout_secs, 3);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = DockyardConfig::from_file(Path::new("/nonexistent/dockyard.yaml")).unwrap_err();
        assert!(matches!(err, DockyardError::ConfigError(_)));
    }
}
