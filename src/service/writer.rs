//! Full-replace write path (TableWriter)
//!
//! Local first, remote best-effort, cache cleared afterwards.

use std::fmt;
use std::sync::Arc;

use super::remote_session::RemoteGateway;
use crate::connectivity::{ModeSelector, StoreMode};
use crate::data::{Database, Record, RecordCache, TableName};
use crate::error::AppError;
use crate::metrics::WRITES_TOTAL;

/// What happened to the remote copy of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Remote overwritten with the same rows
    Synced,
    /// Remote write failed; the rows are saved locally only
    LocalOnly { reason: String },
    /// Offline at write time; remote not attempted
    Offline,
}

impl RemoteWrite {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteWrite::Synced => "synced",
            RemoteWrite::LocalOnly { .. } => "local_only",
            RemoteWrite::Offline => "offline",
        }
    }
}

impl fmt::Display for RemoteWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteWrite::LocalOnly { reason } => write!(f, "saved locally only: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of [`TableWriter::overwrite`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub table: TableName,
    pub rows_written: usize,
    pub remote: RemoteWrite,
}

impl WriteOutcome {
    /// User-facing notice when the remote copy did not take the write
    pub fn notice(&self) -> Option<String> {
        match &self.remote {
            RemoteWrite::LocalOnly { .. } => Some(self.remote.to_string()),
            _ => None,
        }
    }
}

/// Write service
pub struct TableWriter {
    modes: Arc<ModeSelector>,
    db: Arc<Database>,
    remote: Arc<RemoteGateway>,
    cache: Arc<RecordCache>,
}

impl TableWriter {
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

    /// Replace the full contents of `table` with `rows`.
    ///
    /// 1. Local replace (a failure here aborts the write)
    /// 2. Remote clear + header + rows when online, retrying transient faults
    /// 3. Every cache entry invalidated
    ///
    /// Remote failures never fail the write. Nothing is rolled back.
    pub async fn overwrite(
        &self,
        table: TableName,
        rows: &[Record],
    ) -> Result<WriteOutcome, AppError> {
        self.db.replace_all(table, rows).await.inspect_err(|error| {
            error.record();
            tracing::error!(table = %table, %error, "Local write failed");
        })?;

        let remote = match self.modes.current_mode().await {
            StoreMode::Local => {
                tracing::info!(table = %table, rows = rows.len(), "Offline; write kept locally");
                RemoteWrite::Offline
            }
            StoreMode::Remote => match self.write_remote(table, rows).await {
                Ok(()) => RemoteWrite::Synced,
                Err(error) => {
                    error.record();
                    tracing::warn!(table = %table, %error, "Remote write failed; saved locally only");
                    RemoteWrite::LocalOnly {
                        reason: error.to_string(),
                    }
                }
            },
        };

        self.cache.invalidate_all().await;

        WRITES_TOTAL
            .with_label_values(&[table.as_str(), remote.as_str()])
            .inc();
        tracing::info!(table = %table, rows = rows.len(), remote = %remote.as_str(), "Table written");

        Ok(WriteOutcome {
            table,
            rows_written: rows.len(),
            remote,
        })
    }

    async fn write_remote(&self, table: TableName, rows: &[Record]) -> Result<(), AppError> {
        let session = self.remote.open().await?;
        session.overwrite(table, rows).await
    }
}
