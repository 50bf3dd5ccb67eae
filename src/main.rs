//! Binary entrypoint for the signage display.
//!
//! Wires the content store, rotation engine, viewer and operator input
//! together; all logic lives in the library crate.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser};
use humantime::parse_rfc3339;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use signage_display::config::Configuration;
use signage_display::events::{DisplayFrame, EngineCommand};
use signage_display::navigation::Navigator;
use signage_display::settings::SettingsProvider;
use signage_display::store::FileStore;
use signage_display::tasks;
use signage_display::tasks::viewer::LogSurface;

#[derive(Debug, Parser)]
#[command(
    name = "signage-display",
    version,
    about = "Unattended product and announcement signage"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Start the announcement-window clock at this RFC 3339 instant instead of the wall clock
    #[arg(long = "now", value_name = "RFC3339")]
    now: Option<String>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(
            format!("signage_display={level}")
                .parse()
                .context("building log filter")?,
        );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let now_override: Option<DateTime<Utc>> = match cli.now.as_deref() {
        Some(ts) => Some(parse_rfc3339(ts).context("failed to parse --now")?.into()),
        None => None,
    };

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        cli.config.display(),
        cfg
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(run(cfg, now_override));
    // A pending stdin read would otherwise hold shutdown open.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run(cfg: Configuration, now_override: Option<DateTime<Utc>>) -> Result<()> {
    let store = FileStore::new(cfg.content_path.clone());
    let source = Arc::new(store.clone());
    let settings = SettingsProvider::new(Arc::clone(&source), cfg.defaults, cfg.settings_cache_ttl);

    let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(cfg.command_queue); // Input -> Engine
    let (frame_tx, frame_rx) = watch::channel(DisplayFrame::startup()); // Engine -> Viewer
    let navigator = Navigator::new(command_tx);

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Engine
    tasks.spawn({
        let options = cfg.engine_options(now_override);
        let cancel = cancel.clone();
        async move {
            tasks::manager::run(source, settings, options, command_rx, frame_tx, cancel)
                .await
                .context("rotation engine failed")
        }
    });

    // Viewer
    tasks.spawn({
        let cancel = cancel.clone();
        let hide_after = cfg.controls_hide_after;
        async move {
            tasks::viewer::run(frame_rx, LogSurface, hide_after, cancel)
                .await
                .context("viewer task failed")
        }
    });

    // Content watcher
    if cfg.watch_content {
        tasks.spawn({
            let store = store.clone();
            let cancel = cancel.clone();
            async move {
                tasks::files::run(store, cancel)
                    .await
                    .context("content watcher failed")
            }
        });
    }

    // Operator input
    if io::stdin().is_terminal() {
        tasks.spawn({
            let cancel = cancel.clone();
            async move {
                tasks::input::run(navigator, cancel)
                    .await
                    .context("input task failed")
            }
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping operator input");
        drop(navigator);
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.context("task panicked").and_then(|res| res);
        if let Err(err) = outcome {
            tracing::error!("{err:#}");
            cancel.cancel();
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
