//! `whatsapp-gateway` binary.
//!
//! `start` runs the HTTP API, the WhatsApp session and the report scheduler.
//! `reset` wipes the saved session offline. `check` validates configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use whatsapp_gateway::config::Config;
use whatsapp_gateway::credentials::{load_with_process_env, Credentials};
use whatsapp_gateway::datastore::rest::RestDataStore;
use whatsapp_gateway::datastore::DataStore;
use whatsapp_gateway::gateway::{self, GatewayState};
use whatsapp_gateway::heartbeat::daily_report::{DailyReport, ReportSettings};
use whatsapp_gateway::heartbeat::scheduler::CronTrigger;
use whatsapp_gateway::heartbeat::{run_heartbeat, HeartbeatDeps};
use whatsapp_gateway::logging;
use whatsapp_gateway::whatsapp::client::BridgeClientFactory;
use whatsapp_gateway::whatsapp::connection::{ConnectionManager, ConnectionSettings};
use whatsapp_gateway::whatsapp::session_store::SessionStore;
use whatsapp_gateway::whatsapp::setup;

/// Single-session WhatsApp gateway.
#[derive(Debug, Parser)]
#[command(name = "whatsapp-gateway", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the API server, WhatsApp session and report scheduler.
    Start,
    /// Delete the saved WhatsApp session so the next start asks for a new scan.
    Reset,
    /// Validate configuration and credentials, then print a summary.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start => cmd_start(cli.config).await,
        Command::Reset => cmd_reset(cli.config).await,
        Command::Check => cmd_check(cli.config),
    }
}

async fn cmd_start(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load(config_path.as_deref())?;
    let _logging_guard = logging::init_production(&config.logging.dir)?;
    info!(version = env!("CARGO_PKG_VERSION"), "whatsapp gateway starting");

    let credentials = load_with_process_env(&config.auth.env_file)?;
    let api_key = credentials.get(&config.auth.api_key_env).map(Arc::<str>::from);
    if api_key.is_none() {
        warn!(
            env = %config.auth.api_key_env,
            "API key not set, every /api/whatsapp request will be rejected"
        );
    }
    let data_store = build_data_store(&config, &credentials)?;

    let manage_sidecar = config.whatsapp.sidecar.manage;
    let store = session_store(&config).with_preserved_roots(manage_sidecar);
    let bridge_url = if manage_sidecar {
        let docker = bollard::Docker::connect_with_local_defaults()
            .context("failed to connect to Docker")?;
        setup::ensure_bridge(&docker, &config.whatsapp.sidecar, &store)
            .await
            .context("failed to start WhatsApp bridge sidecar")?;
        format!("http://127.0.0.1:{}", config.whatsapp.sidecar.host_port)
    } else {
        config.whatsapp.bridge_url.clone()
    };

    if store.has_saved_session().await {
        info!(dir = %store.auth_dir().display(), "saved session found, resuming");
    } else {
        info!("no saved session, a pairing code will be issued");
    }

    let manager = ConnectionManager::new(
        Arc::new(BridgeClientFactory::new(bridge_url)),
        store,
        ConnectionSettings::from_config(&config.whatsapp),
    );
    manager.start().await;

    let report = Arc::new(DailyReport::new(
        Arc::clone(&manager),
        data_store,
        ReportSettings::from_config(&config.report),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat = if config.report.enabled {
        let deps = HeartbeatDeps {
            report: Arc::clone(&report),
            trigger: CronTrigger::parse("daily_report", &config.report.cron)?,
            tick: Duration::from_secs(config.report.tick_secs),
        };
        Some(tokio::spawn(run_heartbeat(deps, shutdown_rx)))
    } else {
        info!("daily report scheduling disabled");
        None
    };

    let state = GatewayState {
        manager: Arc::clone(&manager),
        report,
        api_key,
    };
    let served = gateway::serve(config.bind_addr()?, state, shutdown_signal()).await;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = heartbeat {
        if let Err(e) = handle.await {
            error!(error = %e, "heartbeat task failed");
        }
    }
    manager.shutdown().await;
    info!("whatsapp gateway stopped");

    served
}

async fn cmd_reset(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    logging::init_cli();
    let config = Config::load(config_path.as_deref())?;
    let store = session_store(&config);
    store
        .wipe()
        .await
        .context("failed to wipe WhatsApp session")?;
    println!(
        "WhatsApp session removed ({}, {}). The next start will ask for a new scan.",
        store.auth_dir().display(),
        store.cache_dir().display()
    );
    Ok(())
}

fn cmd_check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    logging::init_cli();
    let config = Config::load(config_path.as_deref())?;
    let credentials = load_with_process_env(&config.auth.env_file)?;

    println!("config: ok");
    println!("  bind:        {}", config.server.bind);
    println!("  bridge:      {}", config.whatsapp.bridge_url);
    println!("  auth dir:    {}", config.whatsapp.auth_dir.display());
    let sidecar = if config.whatsapp.sidecar.manage {
        "managed"
    } else {
        "external"
    };
    println!("  sidecar:     {sidecar}");

    let trigger = CronTrigger::parse("daily_report", &config.report.cron)?;
    match trigger.next_after(&Local::now()) {
        Some(next) if config.report.enabled => println!("  next report: {next}"),
        Some(_) => println!("  next report: disabled"),
        None => println!("  next report: never"),
    }

    let mut missing = Vec::new();
    for key in [
        &config.auth.api_key_env,
        &config.datastore.url_env,
        &config.datastore.service_key_env,
    ] {
        let state = if credentials.get(key).is_some() {
            "set"
        } else {
            missing.push(key.as_str());
            "missing"
        };
        println!("  {key}: {state}");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("missing credentials: {}", missing.join(", "))
    }
}

fn session_store(config: &Config) -> SessionStore {
    SessionStore::new(&config.whatsapp.auth_dir, &config.whatsapp.cache_dir)
}

fn build_data_store(
    config: &Config,
    credentials: &Credentials,
) -> anyhow::Result<Arc<dyn DataStore>> {
    let url = credentials.require(&config.datastore.url_env)?;
    let key = credentials.require(&config.datastore.service_key_env)?;
    let store = RestDataStore::new(
        &url,
        key,
        Duration::from_secs(config.datastore.request_timeout_secs),
    )
    .context("invalid data store URL")?;
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
