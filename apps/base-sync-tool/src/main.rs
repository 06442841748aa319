//! Command-line client for the base sync service.
//!
//! - `watch`: keep a replica of a project's base in sync and print a summary
//!   after each accepted change, until Ctrl+C
//! - `project`: create, update, or delete projects

mod cli;

use std::sync::Arc;

use anyhow::Context;
use base_sync_client::protocol::{
    AirtableCredentials, CreateProjectRequest, DeleteProjectRequest, Project, UpdateProjectRequest,
};
use base_sync_client::{
    Base, ClientConfig, ProjectClient, SessionState, SyncCallbacks, SyncNotification, SyncSession,
    TcpTransport, Transport,
};
use clap::Parser;
use cli::{Cli, Commands, ProjectCommand};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Watch { project_id, once } => watch(config, &project_id, once).await,
        Commands::Project { command } => project(config, command).await,
    }
}

/// `RUST_LOG` wins; otherwise `-v` picks the level.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config file (or defaults), then `BASESYNC_*` env, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(server) = &cli.server {
        config.server_address = server.clone();
    }
    if let Some(token) = &cli.token {
        config.auth_token = Some(token.clone());
    }
    if cli.verbose > 0 {
        config.verbose = true;
    }
    config.validate()?;
    Ok(config)
}

fn connect_transport(config: &ClientConfig) -> Arc<TcpTransport> {
    let token = config.auth_token.clone().unwrap_or_default();
    Arc::new(
        TcpTransport::new(config.server_address.clone(), token)
            .with_connect_timeout(config.connect_timeout()),
    )
}

fn summarize(base: &Base) -> String {
    format!(
        "base {} '{}': {} tables, {} fields, {} records",
        base.id,
        base.name,
        base.tables.len(),
        base.field_count(),
        base.record_count()
    )
}

async fn watch(config: ClientConfig, project_id: &str, once: bool) -> anyhow::Result<()> {
    let transport = connect_transport(&config);
    let mut options = config.sync_options();
    if once {
        options.only_once = true;
    }
    let mut session = SyncSession::new(transport, config);
    let mut states = session.state_changes();

    let callbacks = SyncCallbacks::new(|base: &Base| println!("{}", summarize(base))).with_delta(
        |notification: &SyncNotification| {
            tracing::info!(
                number = notification.number,
                changes = notification.changes.len(),
                "Applied notification"
            );
        },
    );
    session
        .start_sync(project_id, callbacks, options)
        .await
        .with_context(|| format!("starting sync for project {}", project_id))?;

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("waiting for Ctrl+C")?;
            tracing::info!("Shutting down...");
        }
        _ = states.wait_for(|state| *state == SessionState::Stopped) => {
            tracing::warn!("Connection lost, sync stopped");
        }
    }

    let stale = session.stale_fields();
    if !stale.is_empty() {
        tracing::warn!(count = stale.len(), "Fields with stale options: {:?}", stale);
    }
    session.stop_sync().await?;
    Ok(())
}

async fn project(config: ClientConfig, command: ProjectCommand) -> anyhow::Result<()> {
    let transport = connect_transport(&config);
    let client = ProjectClient::new(transport.clone());

    let project: Project = match command {
        ProjectCommand::Create {
            name,
            description,
            pat,
            airtable_base,
        } => {
            client
                .create_project(&CreateProjectRequest {
                    name,
                    description,
                    airtable: AirtableCredentials {
                        personal_access_token: pat,
                        base_id: airtable_base,
                    },
                })
                .await?
        }
        ProjectCommand::Update {
            id,
            name,
            description,
        } => {
            client
                .update_project(&UpdateProjectRequest {
                    id,
                    name,
                    description,
                    airtable: None,
                })
                .await?
        }
        ProjectCommand::Delete { id } => client.delete_project(&DeleteProjectRequest { id }).await?,
    };

    println!("{}", serde_json::to_string_pretty(&project)?);
    transport.disconnect().await?;
    Ok(())
}
