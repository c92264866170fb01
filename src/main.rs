//! Rollbook binary entry point

use anyhow::Context;
use rollbook::{StoreContext, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Initialize metrics
/// 3. Load configuration from file and environment
/// 4. Initialize StoreContext (database + schema)
/// 5. Pull remote tables when online
/// 6. Report local row counts
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("ROLLBOOK__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rollbook=info,sqlx=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "rollbook=info,sqlx=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Rollbook...");

    // 2. Initialize metrics
    rollbook::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        database = %config.database.path.display(),
        remote_configured = config.has_remote_credentials(),
        "Configuration loaded"
    );

    // 4. Initialize store context
    let store = StoreContext::new(config)
        .await
        .context("failed to open the local store")?;

    let mode = store.current_mode().await;
    tracing::info!(mode = %mode, "Store mode selected");

    // 5. Login-time sync
    if mode == rollbook::connectivity::StoreMode::Remote {
        let report = store.sync_on_login().await;
        if report.succeeded() {
            tracing::info!("Local store is up to date with remote");
        } else {
            tracing::warn!(failed = ?report.failed_tables(), "Sync incomplete; local data may be stale");
        }
    }

    // 6. Report
    let counts = store
        .table_counts()
        .await
        .context("failed to count local rows")?;
    for (table, rows) in counts {
        tracing::info!(table = %table, rows, "Local table");
    }
    tracing::debug!(metrics = %rollbook::metrics::render(), "Metrics snapshot");

    store.db.close().await;
    Ok(())
}
