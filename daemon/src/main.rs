use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use dogstatus_daemon::app::{build_coordinator, build_sinks, status_report};
use dogstatus_daemon::clock::{Clock, SystemClock};
use dogstatus_daemon::config::{self, Config};
use dogstatus_daemon::console::{self, When};
use dogstatus_daemon::coordinator::{lock, StatusCoordinator};
use dogstatus_daemon::error::MonitorError;
use dogstatus_daemon::event::DaemonEvent;
use dogstatus_daemon::{paths, ticker};

/// Tracks how long it has been since the dog was last outside.
#[derive(Parser, Debug)]
#[command(name = "dogstatus")]
#[command(version)]
struct Args {
    /// Path to config.toml (default: $XDG_CONFIG_HOME/dogstatus/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitor until Ctrl+C (default)
    Run,
    /// Record that an event happened, then exit
    Record {
        /// Event kind, e.g. "peed" or "pooped"
        kind: String,
        /// When it happened: ISO-8601 time or -<N>m / -<N>h (default: now)
        #[arg(long, value_name = "TIME", allow_hyphen_values = true)]
        at: Option<String>,
    },
    /// Print the current status of every tracker, then exit
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = args.config.clone().unwrap_or_else(paths::config_file_path);
    let config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        log::error!("[config] {e:#} (using defaults)");
        Config::default()
    });

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(config_path, config).await,
        Command::Record { kind, at } => record_once(&config, &kind, at.as_deref()),
        Command::Status => print_status(&config),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format_timestamp_secs()
        .parse_default_env()
        .init();
}

/// Adds the list of accepted kinds to an unknown-kind error.
fn explain(err: MonitorError, coordinator: &StatusCoordinator) -> anyhow::Error {
    match err {
        MonitorError::UnknownKind(_) => {
            let known = coordinator.kinds().collect::<Vec<_>>().join(", ");
            anyhow::Error::new(err).context(format!("Known kinds: {known}"))
        }
        other => other.into(),
    }
}

fn record_once(config: &Config, kind: &str, at: Option<&str>) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut coordinator = build_coordinator(config, Arc::clone(&clock))?;

    let when = at.map_or(When::Now, console::parse_when);
    let at = when.resolve(&config.global.zone()?, clock.now())?;

    let report = coordinator
        .record_event(kind, at)
        .map_err(|e| explain(e, &coordinator))?;
    if report.published == Some(false) {
        log::warn!(
            "[publish] Recorded, but {} could not be published",
            coordinator.topic()
        );
    }
    let snapshot = coordinator.snapshot();
    for mut sink in build_sinks(config) {
        sink.render(&snapshot);
    }
    println!("{}", status_report(&coordinator));
    Ok(())
}

fn print_status(config: &Config) -> Result<()> {
    let coordinator = build_coordinator(config, Arc::new(SystemClock))?;
    println!("{}", status_report(&coordinator));
    Ok(())
}

async fn run_daemon(config_path: PathBuf, initial_config: Config) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut config = initial_config;

    let coordinator = Arc::new(Mutex::new(build_coordinator(&config, Arc::clone(&clock))?));

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));
    tokio::spawn(console::run(event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    let mut ticker = ticker::start(
        Arc::clone(&coordinator),
        build_sinks(&config),
        config.global.tick_interval(),
    );

    {
        let guard = lock(&coordinator);
        log::info!(
            "dogstatus v{} started for {} ({}), publishing to {}",
            env!("CARGO_PKG_VERSION"),
            guard.subject(),
            guard.kinds().collect::<Vec<_>>().join(", "),
            guard.topic()
        );
    }
    println!("Type a kind to record it, or \"help\".");

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::EventRecorded { kind, when } => {
                let at = match config.global.zone() {
                    Ok(zone) => when.resolve(&zone, clock.now()),
                    Err(e) => {
                        log::error!("[config] {e:#}");
                        continue;
                    }
                };
                let at = match at {
                    Ok(at) => at,
                    Err(e) => {
                        log::warn!("[console] {e}");
                        continue;
                    }
                };
                let result = {
                    let mut guard = lock(&coordinator);
                    guard.record_event(&kind, at).map_err(|e| explain(e, &guard))
                };
                match result {
                    Ok(_) => ticker.refresh(),
                    Err(e) => log::error!("[console] Could not record {kind:?}: {e:#}"),
                }
            }

            DaemonEvent::StatusRequested => {
                println!("{}", status_report(&lock(&coordinator)));
            }

            DaemonEvent::ConfigReloaded(new_config) => {
                // The event log holds all state worth keeping.
                match build_coordinator(&new_config, Arc::clone(&clock)) {
                    Ok(fresh) => {
                        ticker.stop().await;
                        *lock(&coordinator) = fresh;
                        config = new_config;
                        ticker = ticker::start(
                            Arc::clone(&coordinator),
                            build_sinks(&config),
                            config.global.tick_interval(),
                        );
                        log::info!("[config] Reloaded");
                    }
                    Err(e) => log::error!("[config] Keeping previous settings: {e:#}"),
                }
            }

            DaemonEvent::Shutdown => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    ticker.stop().await;
    Ok(())
}
