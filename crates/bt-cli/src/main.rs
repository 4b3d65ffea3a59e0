use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bt_cli::commands::{edit, events, log, track, util};
use bt_cli::{Cli, Commands, Config};
use bt_core::{Clock, EventFilter, LogBroadcaster, SessionStore, SystemClock};
use bt_db::SqliteGateway;
use clap::Parser;
use tracing_subscriber::EnvFilter;

type Store = SessionStore<SqliteGateway, LogBroadcaster, SystemClock>;

/// Load config and open the store, ensuring the database directory exists.
fn open_store(config_path: Option<&Path>) -> Result<(Store, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let gateway = SqliteGateway::open(&config.database_path).context("failed to open database")?;
    let store = SessionStore::new(gateway, LogBroadcaster, SystemClock)
        .with_demo_babies(config.demo_baby_ids());
    Ok((store, config))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (store, config) = open_store(cli.config.as_deref())?;
    let baby = || util::resolve_baby(cli.baby.as_deref(), config.default_baby.as_deref());
    let mut out = std::io::stdout();

    match command {
        Commands::Log(args) => {
            log::run_log(&store, baby()?, args, &mut out).await?;
        }
        Commands::Sleep(args) => {
            log::run_sleep(&store, baby()?, args, &mut out).await?;
        }
        Commands::Pump(args) => {
            log::run_pump(&store, baby()?, args, &mut out).await?;
        }
        Commands::Events {
            event_type,
            since,
            limit,
            json,
        } => {
            let filter = EventFilter {
                event_type: *event_type,
                since: events::since_filter(since.as_deref(), store.clock().now())?,
                limit: Some(*limit),
            };
            events::run(&store, &baby()?, &filter, *json, &mut out).await?;
        }
        Commands::Edit(args) => {
            edit::run_edit(&store, args, &mut out).await?;
        }
        Commands::Delete { id } => {
            edit::run_delete(&store, id, &mut out).await?;
        }
        Commands::Track { tick } => {
            let tick = Duration::from_secs((*tick).max(1));
            track::run(&store, baby()?, tick).await?;
        }
    }

    Ok(())
}
