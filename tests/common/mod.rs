#![allow(dead_code)]

use async_trait::async_trait;
use dockyard::agent::{AgentClient, AgentConnector, AttachFlags, AttachSession, BoxedStream};
use dockyard::config::{DeployConfig, ProbeConfig};
use dockyard::discovery::StaticResolver;
use dockyard::job::{ExposedPorts, JobSpec, JobState, JobStatus, RuntimeConfig, ScheduleRequest};
use dockyard::orchestrator::{Orchestrator, OrchestratorContext};
use dockyard::scheduler::{ClusterState, HostInfo, Placement, SchedulerClient};
use dockyard::{DockyardError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;

pub const HOST_ID: &str = "host-1";
pub const HOST_ADDR: &str = "10.0.2.15";
pub const STORE_ADDR: &str = "store.local:9999";

/// Ordered record of calls made against the fake fleet.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

type PendingAttach = oneshot::Sender<Result<BoxedStream>>;

/// Agent that runs jobs in memory once the fake scheduler places them.
///
/// Build jobs read their stdin to EOF, then emit framed output lines and
/// close the stream.
pub struct FakeAgent {
    log: EventLog,
    jobs: Mutex<HashMap<String, JobState>>,
    pending: Mutex<HashMap<String, PendingAttach>>,
    pub build_exit: Option<i32>,
    pub build_output: Vec<String>,
    pub service_ports: Vec<String>,
    /// `get_job` for this id fails with an agent error instead of answering.
    pub failing_get: Option<String>,
}

impl FakeAgent {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            jobs: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            build_exit: Some(0),
            build_output: vec!["-----> Compiling app".to_string()],
            service_ports: vec!["8080/tcp".to_string()],
            failing_get: None,
        }
    }

    pub fn seed_job(&self, id: &str, status: JobStatus) {
        let job = JobSpec::new(id, RuntimeConfig::new("flynn/slugrunner", vec![]));
        self.jobs.lock().unwrap().insert(
            id.to_string(),
            JobState {
                job,
                status,
                exit_code: None,
            },
        );
    }

    pub fn job(&self, id: &str) -> Option<JobState> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.job(id).map(|s| s.is_live()).unwrap_or(false)
    }

    fn place(&self, mut job: JobSpec) {
        let id = job.id.clone();
        let pending = self.pending.lock().unwrap().remove(&id);

        let state = if job.tcp_ports > 0 {
            job.config.exposed_ports = ExposedPorts::new(self.service_ports.clone());
            JobState {
                job,
                status: JobStatus::Running,
                exit_code: None,
            }
        } else {
            JobState {
                job,
                status: JobStatus::Done,
                exit_code: self.build_exit,
            }
        };
        self.jobs.lock().unwrap().insert(id.clone(), state);

        if let Some(tx) = pending {
            let (client, mut server) = tokio::io::duplex(4096);
            let lines = self.build_output.clone();
            tokio::spawn(async move {
                let mut input = Vec::new();
                let _ = server.read_to_end(&mut input).await;

                let mut lines = lines;
                lines.push(format!("received {} bytes", input.len()));
                for line in lines {
                    let _ = server.write_all(&frame(&line)).await;
                }
                let _ = server.shutdown().await;
            });
            let _ = tx.send(Ok(Box::new(client) as BoxedStream));
        }
    }
}

#[async_trait]
impl AgentClient for FakeAgent {
    async fn get_job(&self, job_id: &str) -> Result<JobState> {
        if self.failing_get.as_deref() == Some(job_id) {
            return Err(DockyardError::AgentError(format!("agent unavailable for {}", job_id)));
        }
        self.job(job_id)
            .ok_or_else(|| DockyardError::NotFound(job_id.to_string()))
    }

    async fn stop_job(&self, job_id: &str) -> Result<()> {
        self.log.push(format!("stop:{}", job_id));
        match self.jobs.lock().unwrap().get_mut(job_id) {
            Some(state) => {
                state.status = JobStatus::Done;
                Ok(())
            }
            None => Err(DockyardError::NotFound(job_id.to_string())),
        }
    }

    async fn attach(
        &self,
        job_id: &str,
        _flags: AttachFlags,
        wait_for_start: bool,
    ) -> Result<AttachSession> {
        self.log.push(format!("attach:{}", job_id));
        if !wait_for_start && self.job(job_id).is_none() {
            return Err(DockyardError::AttachError(format!("no such job {}", job_id)));
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(job_id.to_string(), tx);
        Ok(AttachSession::new(job_id, async move {
            rx.await
                .map_err(|_| DockyardError::AttachError("job never started".to_string()))?
        }))
    }
}

pub struct FakeConnector(pub Arc<FakeAgent>);

impl AgentConnector for FakeConnector {
    fn connect(&self, _host: &HostInfo) -> Result<Arc<dyn AgentClient>> {
        let agent: Arc<dyn AgentClient> = self.0.clone();
        Ok(agent)
    }
}

/// Scheduler that places every job on the fake agent and refuses to
/// place a job whose id is still live.
pub struct FakeScheduler {
    log: EventLog,
    agent: Arc<FakeAgent>,
    hosts: ClusterState,
    requests: Mutex<Vec<ScheduleRequest>>,
    /// Jobs whose id starts with this prefix are rejected.
    fail_submit_for: Option<String>,
}

impl FakeScheduler {
    pub fn new(log: EventLog, agent: Arc<FakeAgent>, hosts: ClusterState) -> Self {
        Self {
            log,
            agent,
            hosts,
            requests: Mutex::new(Vec::new()),
            fail_submit_for: None,
        }
    }

    pub fn requests(&self) -> Vec<ScheduleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn submitted(&self, job_id: &str) -> Option<JobSpec> {
        self.requests()
            .iter()
            .flat_map(|r| r.jobs().cloned().collect::<Vec<_>>())
            .filter(|job| job.id == job_id)
            .last()
    }
}

#[async_trait]
impl SchedulerClient for FakeScheduler {
    async fn submit(&self, request: &ScheduleRequest) -> Result<()> {
        for job in request.jobs() {
            if let Some(prefix) = &self.fail_submit_for {
                if job.id.starts_with(prefix.as_str()) {
                    return Err(DockyardError::SchedulingError(format!(
                        "no capacity for {}",
                        job.id
                    )));
                }
            }
            if self.agent.is_live(&job.id) {
                return Err(DockyardError::SchedulingError(format!(
                    "job {} is already running",
                    job.id
                )));
            }
        }

        self.requests.lock().unwrap().push(request.clone());
        for job in request.jobs() {
            self.log.push(format!("submit:{}", job.id));
            self.agent.place(job.clone());
        }
        Ok(())
    }

    async fn cluster_state(&self) -> Result<ClusterState> {
        Ok(self.hosts.clone())
    }
}

pub fn single_host() -> ClusterState {
    let mut hosts = ClusterState::new();
    hosts.insert(HOST_ID.to_string(), HostInfo::new(HOST_ID, HOST_ADDR));
    hosts
}

pub fn fast_settings() -> DeployConfig {
    DeployConfig {
        port_probe: ProbeConfig {
            initial_delay_ms: 1,
            max_attempts: 3,
            backoff_factor: 1.0,
            max_delay_ms: 1,
        },
        ..DeployConfig::default()
    }
}

/// An in-memory fleet wired into an orchestrator.
pub struct Fleet {
    pub log: EventLog,
    pub agent: Arc<FakeAgent>,
    pub scheduler: Arc<FakeScheduler>,
    pub orchestrator: Orchestrator,
}

pub struct FleetBuilder {
    agent: FakeAgent,
    log: EventLog,
    hosts: ClusterState,
    resolver: StaticResolver,
    fail_submit_for: Option<String>,
}

impl FleetBuilder {
    pub fn new() -> Self {
        let log = EventLog::default();
        Self {
            agent: FakeAgent::new(log.clone()),
            log,
            hosts: single_host(),
            resolver: StaticResolver::single("shelf", STORE_ADDR),
            fail_submit_for: None,
        }
    }

    pub fn agent(mut self, f: impl FnOnce(&mut FakeAgent)) -> Self {
        f(&mut self.agent);
        self
    }

    pub fn hosts(mut self, hosts: ClusterState) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn resolver(mut self, resolver: StaticResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn fail_submit_for(mut self, prefix: &str) -> Self {
        self.fail_submit_for = Some(prefix.to_string());
        self
    }

    pub fn build(self) -> Fleet {
        let agent = Arc::new(self.agent);
        let mut scheduler = FakeScheduler::new(self.log.clone(), agent.clone(), self.hosts);
        scheduler.fail_submit_for = self.fail_submit_for;
        let scheduler = Arc::new(scheduler);
        let ctx = OrchestratorContext {
            resolver: Arc::new(self.resolver),
            scheduler: scheduler.clone(),
            agents: Arc::new(FakeConnector(agent.clone())),
            placement: Placement::First,
        };

        Fleet {
            log: self.log,
            agent,
            scheduler,
            orchestrator: Orchestrator::new(ctx, fast_settings()),
        }
    }
}

/// A line as the agent frames it: eight header bytes, payload, newline.
pub fn frame(line: &str) -> Vec<u8> {
    let mut out = vec![1, 0, 0, 0, 0, 0, 0, line.len() as u8];
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
    out
}
