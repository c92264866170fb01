//! Rollbook - offline-tolerant record store for a school gradebook
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StoreContext                            │
//! │  - read(table) / write(table, rows) / sync_on_login()       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - TableReader (cache, then Remote or Local)                │
//! │  - TableWriter (Local first, Remote best-effort)            │
//! │  - SyncEngine (Remote -> Local on login)                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Spreadsheet REST store (reqwest)                         │
//! │  - TTL record cache                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `connectivity`: Reachability probe and store mode selection
//! - `data`: Table schema, records, SQLite store and cache
//! - `remote`: Remote spreadsheet protocol and Sheets client
//! - `service`: Read, write and sync orchestration
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod config;
pub mod connectivity;
pub mod data;
pub mod error;
pub mod metrics;
pub mod remote;
pub mod service;

use std::sync::Arc;

use config::AppConfig;
use connectivity::{ConnectivityProbe, ModeSelector, StoreMode};
use data::{CacheStats, Database, Record, RecordCache, TableName, TableRow};
use error::AppError;
use remote::RemoteStoreClient;
use service::{
    ReadOutcome, RemoteGateway, RetryPolicy, SyncEngine, SyncReport, TableReader, TableWriter,
    WriteOutcome,
};

/// Everything a read, write or sync needs, created once per process.
pub struct StoreContext {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Remote/Local selection, owns the connectivity probe
    pub modes: Arc<ModeSelector>,

    /// Local SQLite store
    pub db: Arc<Database>,

    /// Lazily connected remote store
    pub remote: Arc<RemoteStoreClient>,

    /// Table snapshots
    pub cache: Arc<RecordCache>,

    reader: TableReader,
    writer: TableWriter,
    sync: SyncEngine,
}

impl StoreContext {
    /// Build the context from configuration.
    ///
    /// Opens the database and creates missing tables. The remote store is
    /// not contacted until the first remote operation.
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        tracing::info!("Initializing store context...");

        tracing::info!(path = %config.database.path.display(), "Connecting to database...");
        let db = Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        let modes = ModeSelector::new(ConnectivityProbe::from_config(&config.connectivity));
        let remote = RemoteStoreClient::from_config(&config);

        Self::from_parts(config, db, modes, remote).await
    }

    /// Build the context from explicit parts and bootstrap the local schema.
    pub async fn from_parts(
        config: AppConfig,
        db: Database,
        modes: ModeSelector,
        remote: RemoteStoreClient,
    ) -> Result<Self, AppError> {
        let created = db.ensure_schema(&config.admin).await?;
        if !created.is_empty() {
            tracing::info!(tables = ?created, "Created local tables");
        }

        let config = Arc::new(config);
        let db = Arc::new(db);
        let modes = Arc::new(modes);
        let remote = Arc::new(remote);
        let cache = Arc::new(RecordCache::new(Some(config.cache.ttl())));
        let gateway = Arc::new(RemoteGateway::new(
            remote.clone(),
            RetryPolicy::from_config(&config.remote),
            Arc::new(config.admin.clone()),
        ));

        let reader = TableReader::new(modes.clone(), db.clone(), gateway.clone(), cache.clone());
        let writer = TableWriter::new(modes.clone(), db.clone(), gateway.clone(), cache.clone());
        let sync = SyncEngine::new(modes.clone(), db.clone(), gateway, cache.clone());

        tracing::info!("Store context initialized");

        Ok(Self {
            config,
            modes,
            db,
            remote,
            cache,
            reader,
            writer,
            sync,
        })
    }

    /// Read the full contents of `table`.
    ///
    /// A degraded remote read is `Ok` with no rows and a `warning`.
    pub async fn read(&self, table: TableName) -> Result<ReadOutcome, AppError> {
        self.reader.fetch(table).await
    }

    /// Replace the full contents of `table` with `rows`.
    pub async fn write(&self, table: TableName, rows: &[Record]) -> Result<WriteOutcome, AppError> {
        self.writer.overwrite(table, rows).await
    }

    /// Pull every synced table from Remote into Local. Never fails.
    pub async fn sync_on_login(&self) -> SyncReport {
        self.sync.pull_all().await
    }

    /// Read a table decoded into its row type
    pub async fn read_typed<T: TableRow>(&self) -> Result<Vec<T>, AppError> {
        let outcome = self.read(T::TABLE).await?;
        data::decode_rows(&outcome.rows)
    }

    /// Encode typed rows and replace their table
    pub async fn write_typed<T: TableRow>(&self, rows: &[T]) -> Result<WriteOutcome, AppError> {
        self.write(T::TABLE, &data::encode_rows(rows)).await
    }

    pub async fn current_mode(&self) -> StoreMode {
        self.modes.current_mode().await
    }

    /// Drop every cached snapshot
    pub async fn clear_cache(&self) {
        self.cache.invalidate_all().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Local row count per table
    pub async fn table_counts(&self) -> Result<Vec<(TableName, i64)>, AppError> {
        let mut counts = Vec::with_capacity(TableName::ALL.len());
        for table in TableName::ALL {
            counts.push((table, self.db.row_count(table).await?));
        }
        Ok(counts)
    }
}
