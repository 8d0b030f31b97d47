//! Build-then-deploy workflow.
//!
//! A run walks through [`DeployPhase`]s in order:
//!
//! 1. `Init` - pick the target host and connect to its agent
//! 2. `Resolving` - find the artifact store
//! 3. `Building` - attach to the build job, then schedule it
//! 4. `AwaitingBuild` - stream build output until the job closes the stream
//! 5. `StoppingPrevious` - stop the previous service job if there is one
//! 6. `Deploying` - schedule the service job with one TCP port
//! 7. `ResolvingPort` - poll the agent for the port the job was given
//!
//! Any error aborts the run. Nothing is rolled back on the cluster.

pub mod phase;
pub mod port;

pub use phase::{DeployPhase, Endpoint};

use crate::agent::{AgentClient, AgentConnector, AttachFlags, HttpAgentConnector};
use crate::config::{DeployConfig, DockyardConfig, ProbeConfig};
use crate::discovery::{self, Resolver};
use crate::job::{JobId, JobSpec, JobState, RuntimeConfig, ScheduleRequest};
use crate::scheduler::{ClusterState, HostInfo, HttpSchedulerClient, Placement, SchedulerClient};
use crate::stream::StreamMultiplexer;
use crate::{DockyardError, Result};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Collaborators the orchestrator drives.
#[derive(Clone)]
pub struct OrchestratorContext {
    pub resolver: Arc<dyn Resolver>,
    pub scheduler: Arc<dyn SchedulerClient>,
    pub agents: Arc<dyn AgentConnector>,
    pub placement: Placement,
}

impl OrchestratorContext {
    pub fn from_config(config: &DockyardConfig) -> Result<Self> {
        Ok(Self {
            resolver: discovery::from_config(&config.discovery, config.scheduler.timeout_secs)?,
            scheduler: Arc::new(HttpSchedulerClient::new(&config.scheduler)?),
            agents: Arc::new(HttpAgentConnector::new(config.agent.clone())),
            placement: config.placement.clone(),
        })
    }
}

/// The service job of an app as currently seen by its host.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub job_id: String,
    pub host: HostInfo,
    pub state: Option<JobState>,
    pub endpoint: Option<Endpoint>,
}

pub struct Orchestrator {
    ctx: OrchestratorContext,
    settings: DeployConfig,
    multiplexer: StreamMultiplexer,
}

impl Orchestrator {
    pub fn new(ctx: OrchestratorContext, settings: DeployConfig) -> Self {
        Self {
            ctx,
            settings,
            multiplexer: StreamMultiplexer::new(),
        }
    }

    pub fn from_config(config: &DockyardConfig) -> Result<Self> {
        Ok(Self::new(
            OrchestratorContext::from_config(config)?,
            config.deploy.clone(),
        ))
    }

    pub async fn cluster_state(&self) -> Result<ClusterState> {
        self.ctx.scheduler.cluster_state().await
    }

    /// Choose the target host and connect to its agent.
    pub async fn select_host(&self) -> Result<(HostInfo, Arc<dyn AgentClient>)> {
        let state = self.ctx.scheduler.cluster_state().await?;
        let host = self.ctx.placement.select(&state)?;
        info!("Selected host {} ({})", host.id, host.address);

        let agent = self.ctx.agents.connect(&host)?;
        Ok((host, agent))
    }

    /// Build `app` from the artifact store and (re)deploy it as a service.
    ///
    /// `input` is forwarded to the build job's stdin; build output and
    /// progress milestones are written to `output`.
    pub async fn deploy<R, W>(&self, app: &str, input: R, output: &mut W) -> Result<Endpoint>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut phase = DeployPhase::Init;

        match self.run(app, input, output, &mut phase).await {
            Ok(endpoint) => {
                advance(app, &mut phase, DeployPhase::Done);
                info!("Deployed {} at {}", app, endpoint);
                Ok(endpoint)
            }
            Err(e) => {
                error!("Deployment of {} failed during {}: {}", app, phase, e);
                advance(app, &mut phase, DeployPhase::Failed);
                Err(e)
            }
        }
    }

    async fn run<R, W>(
        &self,
        app: &str,
        input: R,
        output: &mut W,
        phase: &mut DeployPhase,
    ) -> Result<Endpoint>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Unpin + ?Sized,
    {
        validate_app_name(app)?;
        self.prepare_app_dir(app).await?;
        let (host, agent) = self.select_host().await?;

        advance(app, phase, DeployPhase::Resolving);
        let store = self.ctx.resolver.resolve(&self.settings.artifact_service).await?;
        let artifact_url = artifact_url(&store, app);
        debug!("Artifact for {} is {}", app, artifact_url);

        advance(app, phase, DeployPhase::Building);
        milestone(&mut *output, &format!("-----> Building {}...", app)).await?;
        let build_id = JobId::build(app).to_string();
        // Attach first: the agent tolerates the job not existing yet, and no
        // output is lost if the job exits quickly.
        let session = agent
            .attach(&build_id, AttachFlags::interactive(), true)
            .await?;
        let build_job = self.build_job(&build_id, &artifact_url);
        self.ctx
            .scheduler
            .submit(&ScheduleRequest::incremental(&host.id, vec![build_job]))
            .await?;

        advance(app, phase, DeployPhase::AwaitingBuild);
        let stream = session.confirm_ready().await?;
        let summary = self.multiplexer.run(stream, input, &mut *output).await?;
        debug!("Build {} produced {} lines", build_id, summary.lines);
        check_build_exit(agent.as_ref(), &build_id, &self.settings.exit_probe).await?;

        advance(app, phase, DeployPhase::StoppingPrevious);
        milestone(&mut *output, &format!("-----> Deploying {} ...", app)).await?;
        let web_id = JobId::web(app).to_string();
        stop_if_exists(agent.as_ref(), &web_id).await?;

        advance(app, phase, DeployPhase::Deploying);
        let service_job = self.service_job(&web_id, &artifact_url, app);
        self.ctx
            .scheduler
            .submit(&ScheduleRequest::incremental(&host.id, vec![service_job]))
            .await?;

        advance(app, phase, DeployPhase::ResolvingPort);
        let port = port::resolve_port(agent.as_ref(), &web_id, &self.settings.port_probe).await?;

        Ok(Endpoint::new(self.endpoint_host(&host), port))
    }

    /// Look up the service job of `app` without changing anything.
    pub async fn status(&self, app: &str) -> Result<ServiceStatus> {
        validate_app_name(app)?;
        let (host, agent) = self.select_host().await?;
        let job_id = JobId::web(app).to_string();

        let state = match agent.get_job(&job_id).await {
            Ok(state) => Some(state),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let endpoint = state
            .as_ref()
            .and_then(port::first_port)
            .map(|port| Endpoint::new(self.endpoint_host(&host), port));

        Ok(ServiceStatus {
            job_id,
            host,
            state,
            endpoint,
        })
    }

    fn build_job(&self, job_id: &str, artifact_url: &str) -> JobSpec {
        let config =
            RuntimeConfig::new(&self.settings.build_image, vec![artifact_url.to_string()])
                .interactive();
        JobSpec::new(job_id, config)
    }

    fn service_job(&self, job_id: &str, artifact_url: &str, app: &str) -> JobSpec {
        let config = RuntimeConfig::new(
            &self.settings.service_image,
            self.settings.service_command.clone(),
        )
        .with_env("SLUG_URL", artifact_url)
        .with_env("SD_NAME", app);
        JobSpec::new(job_id, config).with_tcp_ports(1)
    }

    fn endpoint_host(&self, host: &HostInfo) -> String {
        match &self.settings.public_address {
            Some(address) => address.clone(),
            None if !host.address.is_empty() => host.address.clone(),
            None => host.id.clone(),
        }
    }

    async fn prepare_app_dir(&self, app: &str) -> Result<()> {
        if let Some(root) = &self.settings.apps_root {
            let dir = root.join(app);
            debug!("Preparing app directory {}", dir.display());
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

/// Stop `job_id` if the agent knows it.
///
/// Returns whether a stop was issued. The stop itself is best-effort: its
/// failure is logged and otherwise ignored.
pub async fn stop_if_exists(agent: &dyn AgentClient, job_id: &str) -> Result<bool> {
    match agent.get_job(job_id).await {
        Ok(state) => {
            info!("Stopping previous job {} ({})", job_id, state.status);
            if let Err(e) = agent.stop_job(job_id).await {
                warn!("Ignoring failure to stop {}: {}", job_id, e);
            }
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            debug!("No previous job {}", job_id);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Fail if the agent reports a non-zero exit code for the build job.
///
/// A job can still be reported live for a moment after its stream closed, so
/// a live job without an exit code is re-queried on the `probe` schedule.
/// Agents that report no exit status leave stream closure as the only
/// completion signal.
pub async fn check_build_exit(
    agent: &dyn AgentClient,
    job_id: &str,
    probe: &ProbeConfig,
) -> Result<()> {
    let mut delays = probe.delays();

    loop {
        let state = match agent.get_job(job_id).await {
            Ok(state) => state,
            Err(e) if e.is_not_found() => {
                warn!("Build {} no longer known to agent, assuming success", job_id);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match state.exit_code {
            Some(0) => return Ok(()),
            Some(code) => {
                return Err(DockyardError::BuildFailed {
                    job: job_id.to_string(),
                    code,
                })
            }
            None if state.is_live() => match delays.next() {
                Some(delay) => {
                    debug!("Build {} still {}, waiting for exit status", job_id, state.status);
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(
                        "Build {} still {} with no exit status, assuming success",
                        job_id, state.status
                    );
                    return Ok(());
                }
            },
            None => {
                warn!(
                    "Build {} reported no exit status ({}), assuming success",
                    job_id, state.status
                );
                return Ok(());
            }
        }
    }
}

pub fn artifact_url(store_addr: &str, app: &str) -> String {
    format!("http://{}/{}.tgz", store_addr, app)
}

pub fn validate_app_name(app: &str) -> Result<()> {
    if app.is_empty() {
        return Err(DockyardError::InvalidAppName(
            "app name cannot be empty".to_string(),
        ));
    }
    if !app
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DockyardError::InvalidAppName(format!(
            "{:?} contains invalid characters",
            app
        )));
    }
    Ok(())
}

fn advance(app: &str, phase: &mut DeployPhase, next: DeployPhase) {
    debug!("Deployment of {}: {} -> {}", app, phase, next);
    *phase = next;
    info!("Deployment of {} entered {}", app, next);
}

async fn milestone<W>(output: &mut W, message: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    output.write_all(message.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
