use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ft_cli::commands::session::Press;
use ft_cli::commands::{page, session, status};
use ft_cli::ipc::SocketLink;
use ft_cli::{Cli, Commands, Config, daemon};
use ft_core::{SessionUi, SystemClock};
use ft_db::Database;

type CliUi = SessionUi<Database, SystemClock, SocketLink>;

/// Opens the database and builds a UI that reports to the daemon socket.
fn open_ui(config: &Config) -> Result<CliUi> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    SessionUi::open(
        db,
        SystemClock,
        SocketLink::new(config.socket_path.clone()),
        config.daily_focus_goal_ms,
    )
    .context("failed to read session state")
}

/// Runs an async command on a single-threaded runtime.
fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(future)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

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
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = std::io::stdout().lock();
    match command {
        Commands::Daemon => block_on(daemon::run(&config))?,
        Commands::Focus => session::run(&mut stdout, &mut open_ui(&config)?, Press::Focus)?,
        Commands::Relax => session::run(&mut stdout, &mut open_ui(&config)?, Press::Relax)?,
        Commands::Reset { kind } => {
            session::run(&mut stdout, &mut open_ui(&config)?, Press::Reset(*kind))?;
        }
        Commands::Status { json, watch } => {
            let mut ui = open_ui(&config)?;
            if *watch {
                let interval = Duration::from_millis(config.refresh_interval_ms.max(1));
                block_on(status::watch(
                    &mut stdout,
                    &mut ui,
                    &config.socket_path,
                    interval,
                    *json,
                ))?;
            } else {
                status::run(&mut stdout, ui.view(), *json)?;
            }
        }
        Commands::Page { url } => block_on(page::run(&config, url))?,
    }

    Ok(())
}
