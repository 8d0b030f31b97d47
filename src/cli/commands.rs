use crate::cli::Commands;
use crate::config::DockyardConfig;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use tracing::info;

pub async fn handle_command(command: Commands, config: DockyardConfig) -> Result<()> {
    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to set up fleet clients")?;

    match command {
        Commands::Deploy { app } => handle_deploy(&orchestrator, &app).await,
        Commands::Hosts => handle_hosts(&orchestrator).await,
        Commands::Status { app } => handle_status(&orchestrator, &app).await,
    }
}

async fn handle_deploy(orchestrator: &Orchestrator, app: &str) -> Result<()> {
    info!("Deploy requested for {}", app);

    let mut stdout = tokio::io::stdout();
    let endpoint = orchestrator
        .deploy(app, tokio::io::stdin(), &mut stdout)
        .await
        .with_context(|| format!("Failed to deploy {}", app))?;

    println!("=====> Application deployed:");
    println!("       {}", endpoint.url());
    println!();
    Ok(())
}

async fn handle_hosts(orchestrator: &Orchestrator) -> Result<()> {
    let state = orchestrator
        .cluster_state()
        .await
        .context("Failed to fetch cluster state")?;

    if state.is_empty() {
        println!("No hosts available");
        return Ok(());
    }

    println!("{:<30} {:<30}", "HOST", "ADDRESS");
    for host in state.values() {
        println!("{:<30} {:<30}", host.id, host.address);
    }
    Ok(())
}

async fn handle_status(orchestrator: &Orchestrator, app: &str) -> Result<()> {
    let status = orchestrator
        .status(app)
        .await
        .with_context(|| format!("Failed to get status of {}", app))?;

    println!("Job:      {}", status.job_id);
    println!("Host:     {}", status.host.id);
    match &status.state {
        Some(state) => {
            println!("Status:   {}", state.status);
            if let Some(code) = state.exit_code {
                println!("Exit:     {}", code);
            }
            if !state.exposed_ports().is_empty() {
                let ports: Vec<&str> = state.exposed_ports().iter().collect();
                println!("Ports:    {}", ports.join(", "));
            }
        }
        None => println!("Status:   not deployed"),
    }
    if let Some(endpoint) = &status.endpoint {
        println!("Endpoint: {}", endpoint.url());
    }
    Ok(())
}
