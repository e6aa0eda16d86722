//! trailview: follow coding-agent session logs live from the terminal.
//!
//! Entry point for the `trailview` binary. Wires together configuration
//! (`config`), logging (`logging`), the unified event bus (`event`), the sync
//! coordinator (`sync`) with its file watcher (`watcher`), the diff worker
//! pool (`diffs`), and the transcript store from `trailview-core`.
//!
//! # Startup sequence
//!
//! 1. Parse the CLI, load the config file and apply CLI overrides.
//! 2. Install the `tracing` subscriber (stderr) from the configured level.
//! 3. `register_termination()`: returns an `Arc<AtomicBool>` polled by the loop.
//! 4. Open the store (SQLite unless `--memory`), creating its directory.
//! 5. Create the event channel, the watcher, the coordinator and the pool.
//! 6. Select the first session and enter the owner loop.
//!
//! The loop exits only via `break` (quit command, signal, or channel close),
//! so `App::shutdown()` always runs and stops the live watch and pool.

mod app;
mod config;
mod diffs;
mod event;
mod logging;
mod output;
mod signal;
mod sync;
#[cfg(test)]
mod testing;
mod viewport;
mod watcher;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use trailview_core::db::SqliteStore;
use trailview_core::{JsonlParser, MemoryStore, TranscriptStore};

use crate::app::{App, Outcome};
use crate::config::Config;
use crate::diffs::worker::DiffWorkerPool;
use crate::sync::{SessionRef, SyncCoordinator};
use crate::viewport::Viewport;
use crate::watcher::NotifyWatcher;

/// Follow coding-agent session logs and print their transcripts as they grow.
#[derive(Debug, Parser)]
#[command(name = "trailview", version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/trailview/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database for synced transcripts.
    #[arg(long, conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Keep transcripts in memory only.
    #[arg(long)]
    memory: bool,

    /// Messages per page.
    #[arg(long)]
    page_size: Option<usize>,

    /// Session logs (JSONL); the file stem is the session id.
    #[arg(required = true)]
    logs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_file = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = config::load(&config_file);
    if let Some(db) = cli.db {
        config.database = db;
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }

    logging::init(&config.log_level);
    let term_flag = signal::register_termination().context("cannot register signal handlers")?;

    let sessions: Vec<SessionRef> = cli.logs.iter().map(|p| SessionRef::from_path(p)).collect();

    if cli.memory {
        tracing::info!("using in-memory store");
        return run(Arc::new(MemoryStore::new()), sessions, &config, term_flag).await;
    }

    if let Some(dir) = config.database.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let db_path = config.database.to_string_lossy().into_owned();
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("cannot open database {db_path}"))?;
    tracing::info!(db = %db_path, "opened transcript store");
    run(Arc::new(store), sessions, &config, term_flag).await
}

/// Runs the owner loop until quit, signal, or channel close.
async fn run<S: TranscriptStore>(
    store: Arc<S>,
    sessions: Vec<SessionRef>,
    config: &Config,
    term_flag: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let handler = event::EventHandler::new();
    let tx = handler.tx.clone();
    let mut rx = handler.rx;

    let watcher = NotifyWatcher::new(tx.clone());
    let sync = SyncCoordinator::new(store, Arc::new(JsonlParser), watcher, tx.clone());
    let pool = DiffWorkerPool::spawn(config.diff_workers, tx.clone())
        .context("cannot start diff workers")?;
    let mut app = App::new(
        sessions,
        sync,
        Viewport::new(config.page_size),
        Some(pool),
        config.inline_diff_limit,
    );

    event::spawn_input_task(tx);

    let mut stdout = std::io::stdout().lock();
    output::render_sessions(&mut stdout, &app.sessions, None)?;
    if app.select(0) == Outcome::Redraw {
        output::render_transcript(&mut stdout, &app)?;
    }

    'event_loop: loop {
        tokio::select! {
            // Heartbeat: a quiet session never wakes rx.recv(), so the signal
            // flag is checked here at least every 50ms.
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    tracing::info!("termination signal received");
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else {
                    break 'event_loop;
                };
                match app.handle(event) {
                    Outcome::Idle => {}
                    Outcome::Redraw => output::render_transcript(&mut stdout, &app)?,
                    Outcome::ListSessions => {
                        output::render_sessions(&mut stdout, &app.sessions, app.selected())?;
                    }
                    Outcome::Quit => break 'event_loop,
                }
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    app.shutdown();
    Ok(())
}
