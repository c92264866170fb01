//! Login-time pull of Remote into Local (SyncEngine)

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::remote_session::RemoteGateway;
use crate::connectivity::{ModeSelector, StoreMode};
use crate::data::{Database, RecordCache, TableName};
use crate::metrics::{SYNC_TABLES_TOTAL, observe_sync};

/// Per-table sync status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSyncStatus {
    /// Local table replaced with this many remote rows
    Pulled { rows: usize },
    /// Remote read or local replace failed; Local left as it was
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSyncResult {
    pub table: TableName,
    pub status: TableSyncStatus,
}

/// Summary of one [`SyncEngine::pull_all`] run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Offline at login; nothing attempted
    pub skipped_offline: bool,
    pub tables: Vec<TableSyncResult>,
}

impl SyncReport {
    /// True only when online and every table was pulled
    pub fn succeeded(&self) -> bool {
        !self.skipped_offline
            && self
                .tables
                .iter()
                .all(|result| matches!(result.status, TableSyncStatus::Pulled { .. }))
    }

    pub fn failed_tables(&self) -> Vec<TableName> {
        self.tables
            .iter()
            .filter(|result| matches!(result.status, TableSyncStatus::Failed { .. }))
            .map(|result| result.table)
            .collect()
    }
}

/// Sync service
pub struct SyncEngine {
    modes: Arc<ModeSelector>,
    db: Arc<Database>,
    remote: Arc<RemoteGateway>,
    cache: Arc<RecordCache>,
}

impl SyncEngine {
    pub fn new(
        modes: Arc<ModeSelector>,
        db: Arc<Database>,
        remote: Arc<RemoteGateway>,
        cache: Arc<RecordCache>,
    ) -> Self {
        Self {
            modes,
            db,
            remote,
            cache,
        }
    }

    /// Mirror every synced table (all but Attendance) from Remote into Local.
    ///
    /// Skipped entirely while offline. Tables are independent: a failed
    /// table is recorded and the rest still run. Local rows are only
    /// replaced after a successful remote read.
    pub async fn pull_all(&self) -> SyncReport {
        let started = Instant::now();
        let started_at = Utc::now();

        if self.modes.current_mode().await == StoreMode::Local {
            tracing::info!("Offline at login; skipping sync");
            observe_sync("skipped", started.elapsed());
            return SyncReport {
                started_at,
                finished_at: Utc::now(),
                skipped_offline: true,
                tables: Vec::new(),
            };
        }

        tracing::info!("Syncing remote tables into local store");

        let tables = match self.remote.open().await {
            Ok(session) => {
                let mut results = Vec::with_capacity(TableName::SYNCED.len());
                for table in TableName::SYNCED {
                    let status = match session.read_all(table).await {
                        Ok(rows) => match self.db.replace_all(table, &rows).await {
                            Ok(()) => TableSyncStatus::Pulled { rows: rows.len() },
                            Err(error) => {
                                error.record();
                                TableSyncStatus::Failed {
                                    error: error.to_string(),
                                }
                            }
                        },
                        Err(error) => {
                            error.record();
                            TableSyncStatus::Failed {
                                error: error.to_string(),
                            }
                        }
                    };
                    results.push(Self::finish_table(table, status));
                }
                results
            }
            Err(error) => {
                error.record();
                tracing::error!(%error, "Remote store unavailable; sync aborted");
                TableName::SYNCED
                    .into_iter()
                    .map(|table| {
                        Self::finish_table(
                            table,
                            TableSyncStatus::Failed {
                                error: error.to_string(),
                            },
                        )
                    })
                    .collect()
            }
        };

        self.cache.invalidate_all().await;

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            skipped_offline: false,
            tables,
        };
        let status = if report.succeeded() { "success" } else { "partial" };
        observe_sync(status, started.elapsed());
        tracing::info!(
            status,
            failed = report.failed_tables().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync finished"
        );

        report
    }

    fn finish_table(table: TableName, status: TableSyncStatus) -> TableSyncResult {
        match &status {
            TableSyncStatus::Pulled { rows } => {
                tracing::info!(table = %table, rows, "Table synced");
                SYNC_TABLES_TOTAL
                    .with_label_values(&[table.as_str(), "pulled"])
                    .inc();
            }
            TableSyncStatus::Failed { error } => {
                tracing::warn!(table = %table, %error, "Table sync failed; local copy kept");
                SYNC_TABLES_TOTAL
                    .with_label_values(&[table.as_str(), "failed"])
                    .inc();
            }
        }
        TableSyncResult { table, status }
    }
}
