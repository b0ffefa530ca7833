//! # Harbor Sync Agent
//!
//! Headless host for one register's sync loop.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Agent Startup                                     │
//! │                                                                         │
//! │  1. Initialize Logging                                                  │
//! │     • tracing-subscriber with env filter, RUST_LOG overrides            │
//! │                                                                         │
//! │  2. Load Configuration                                                  │
//! │     • HARBOR_CONFIG or the platform config dir (sync.toml)              │
//! │     • HARBOR_* environment overrides                                    │
//! │                                                                         │
//! │  3. Open Database                                                       │
//! │     • HARBOR_DB_PATH or the platform data dir (harbor.db)               │
//! │     • SQLite with WAL mode, pending migrations applied                  │
//! │                                                                         │
//! │  4. Spawn SyncAgent, wait for Ctrl+C / SIGTERM, stop gracefully         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use harbor_db::{Database, DbConfig};
use harbor_sync::{
    AgentOptions, EngineOptions, HttpTransport, SyncAgent, SyncConfig, SyncEngine,
    SyncEventEmitter, SyncStatus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Harbor sync agent");

    let config_path = std::env::var_os("HARBOR_CONFIG").map(PathBuf::from);
    let config = SyncConfig::load(config_path).context("loading sync configuration")?;
    info!(
        terminal_id = %config.terminal_id(),
        server = %config.server.base_url,
        "Configuration loaded"
    );

    let db_path = database_path().context("resolving database path")?;
    info!(?db_path, "Database path determined");

    let db = Database::new(DbConfig::new(db_path))
        .await
        .context("opening local database")?;
    info!("Database connected and migrations applied");

    let transport = Arc::new(HttpTransport::from_config(&config)?);
    let engine = Arc::new(SyncEngine::new(
        db.clone(),
        transport,
        EngineOptions::from_config(&config),
    ));

    let agent = SyncAgent::with_emitter(engine, AgentOptions::from_config(&config), Arc::new(LogEmitter));
    let (handle, task) = agent.spawn();

    shutdown_signal().await;

    handle.shutdown();
    if let Err(e) = task.await {
        error!(error = %e, "Sync agent task panicked");
    }

    let status = handle.status().await;
    info!(
        pending = status.pending_changes,
        cursor = status.cursor,
        "Sync agent stopped"
    );

    db.close().await;
    Ok(())
}

/// Forwards agent events to the log.
struct LogEmitter;

impl SyncEventEmitter for LogEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        info!(
            reachable = status.server_reachable,
            pending = status.pending_changes,
            cursor = status.cursor,
            failures = status.consecutive_failures,
            "Sync status"
        );
    }

    fn emit_progress(&self, pushed: usize, pulled: usize) {
        info!(pushed, pulled, "Sync progress");
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        if retryable {
            warn!(error = message, "Sync error, will retry");
        } else {
            error!(error = message, "Sync error");
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=harbor_sync=trace` - Trace the engine only
/// - Default: INFO, DEBUG for harbor crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,harbor=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Determines the database file path.
///
/// `HARBOR_DB_PATH` wins; otherwise `harbor.db` in the platform data dir,
/// which is created if missing.
fn database_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os("HARBOR_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    let dirs = directories::ProjectDirs::from("com", "harbor", "pos")
        .context("no home directory for the data path")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    Ok(data_dir.join("harbor.db"))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sync agent...");
}
