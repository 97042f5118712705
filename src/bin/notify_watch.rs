//! # Feedback Notification Watcher
//!
//! Runs the notification reconciler against a Postgres feedback table and logs
//! the header state (badge and dropdown lines) every time it changes.

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use jeepney_notify::config::{sanitize_database_url, ConfigLoader};
use jeepney_notify::logging::init_structured_logging;
use jeepney_notify::{DeploymentMode, NotificationReconciler, PgFeedbackStore};

#[derive(Parser, Debug)]
#[command(name = "notify_watch")]
#[command(about = "Watch new feedback notifications for the jeepney admin console")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/notify.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration directory for notify.<environment>.toml overlays
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Environment name (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Postgres connection string; overrides DATABASE_URL and the config file
    #[arg(long)]
    database_url: Option<String>,

    /// Override the configured deployment mode
    #[arg(long, value_parser = parse_mode)]
    mode: Option<DeploymentMode>,

    /// Create the insert trigger before watching
    #[arg(long)]
    install_trigger: bool,

    /// Run one poll, print the dropdown and exit
    #[arg(long)]
    once: bool,
}

fn parse_mode(value: &str) -> Result<DeploymentMode, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|_| {
        format!("unknown mode '{value}' (EventDrivenOnly, PollingOnly, Hybrid, Disabled)")
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let mut loader = ConfigLoader::new().with_config_directory(&cli.config_dir);
    if let Some(environment) = &cli.environment {
        loader = loader.with_environment(environment);
    }
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }

    let mut config = loader.load().context("loading notification configuration")?;
    if let Some(mode) = cli.mode {
        config.deployment_mode = mode;
    }

    let database_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .or_else(|| config.database_url.clone())
        .context("no database url: pass --database-url, set DATABASE_URL or database_url")?;

    info!(
        database_url = %sanitize_database_url(Some(&database_url)),
        "Connecting to feedback database"
    );
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .context("connecting to feedback database")?;

    let store = Arc::new(PgFeedbackStore::new(pool, &config)?);
    if cli.install_trigger || config.install_trigger {
        store.install_insert_trigger().await?;
    }

    let reconciler = Arc::new(NotificationReconciler::new(
        config,
        store.clone(),
        store.clone(),
    )?);

    if cli.once {
        reconciler.on_poll_tick().await;
        print_header(&reconciler);
        return Ok(());
    }

    let mut changes = reconciler.subscribe_changes();
    let handle = reconciler.start()?;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
                }
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                info!(badge = snapshot.badge, ids = ?snapshot.ids(), "Notifications changed");
                print_header(&reconciler);
            }
        }
    }

    handle.shutdown().await;
    info!(stats = ?reconciler.stats(), "Watcher stopped");
    Ok(())
}

fn print_header(reconciler: &NotificationReconciler) {
    println!("[{}]", reconciler.badge());
    for line in reconciler.render() {
        println!("  {line}");
    }
}
