//! Table read path
//!
//! Cache first, then whichever store the current mode selects.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::remote_session::RemoteGateway;
use crate::connectivity::{ModeSelector, StoreMode};
use crate::data::{Database, Record, RecordCache, TableName};
use crate::error::AppError;

/// Result of [`TableReader::fetch`]
#[derive(Debug)]
pub struct ReadOutcome {
    /// Full table snapshot (empty when the remote read degraded)
    pub rows: Arc<Vec<Record>>,
    /// Store that produced the snapshot
    pub source: StoreMode,
    /// Whether the snapshot came from the cache
    pub cached: bool,
    pub fetched_at: DateTime<Utc>,
    /// Remote failure swallowed into an empty result
    pub warning: Option<AppError>,
}

impl ReadOutcome {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Read service
pub struct TableReader {
    modes: Arc<ModeSelector>,
    db: Arc<Database>,
    remote: Arc<RemoteGateway>,
    cache: Arc<RecordCache>,
}

impl TableReader {
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

    /// Read a whole table.
    ///
    /// Fresh cache entries are served without touching either store. In
    /// Local mode rows come from SQLite and the remote is never contacted.
    /// In Remote mode retries are applied; exhausted or unrecoverable
    /// remote failures degrade to an empty, uncached result.
    ///
    /// # Errors
    /// Local I/O failures, and [`AppError::RemoteFatal`] when the remote
    /// store cannot be opened at all.
    pub async fn fetch(&self, table: TableName) -> Result<ReadOutcome, AppError> {
        if let Some(hit) = self.cache.get_fresh(table).await {
            tracing::debug!(table = %table, source = %hit.source, "Cache hit");
            return Ok(ReadOutcome {
                rows: hit.rows,
                source: hit.source,
                cached: true,
                fetched_at: hit.fetched_at,
                warning: None,
            });
        }

        let mode = self.modes.current_mode().await;
        tracing::debug!(table = %table, mode = %mode, "Cache miss; reading from store");

        let rows = match mode {
            StoreMode::Local => self.db.read_all(table).await.inspect_err(|error| {
                error.record();
                tracing::error!(table = %table, %error, "Local read failed");
            })?,
            StoreMode::Remote => match self.read_remote(table).await {
                Ok(rows) => rows,
                Err(error) if error.is_fatal() => {
                    error.record();
                    return Err(error);
                }
                Err(error) => {
                    error.record();
                    tracing::warn!(table = %table, %error, "Remote read degraded to an empty result");
                    return Ok(ReadOutcome {
                        rows: Arc::new(Vec::new()),
                        source: StoreMode::Remote,
                        cached: false,
                        fetched_at: Utc::now(),
                        warning: Some(error),
                    });
                }
            },
        };

        let rows = Arc::new(rows);
        self.cache.insert(table, rows.clone(), mode).await;

        Ok(ReadOutcome {
            rows,
            source: mode,
            cached: false,
            fetched_at: Utc::now(),
            warning: None,
        })
    }

    async fn read_remote(&self, table: TableName) -> Result<Vec<Record>, AppError> {
        let session = self.remote.open().await?;
        session.read_all(table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminConfig;
    use crate::connectivity::ConnectivityProbe;
    use crate::connectivity::MockReachability;
    use crate::remote::{
        MockRemoteConnector, MockRemoteStore, RemoteError, RemoteStore, RemoteStoreClient,
    };
    use crate::service::RetryPolicy;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn reader(online: bool, store: MockRemoteStore) -> (TableReader, Arc<Database>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::connect(&dir.path().join("read.db")).await.unwrap());
        db.ensure_schema(&AdminConfig::default()).await.unwrap();

        let mut check = MockReachability::new();
        check.expect_is_reachable().returning(move || online);
        let modes = ModeSelector::new(ConnectivityProbe::new(
            Arc::new(check),
            Duration::from_secs(30),
        ));

        let store: Arc<dyn RemoteStore> = Arc::new(store);
        let mut connector = MockRemoteConnector::new();
        connector
            .expect_connect()
            .returning(move || Ok(store.clone()));
        let remote = RemoteGateway::new(
            Arc::new(RemoteStoreClient::new(Arc::new(connector))),
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            },
            Arc::new(AdminConfig::default()),
        );

        let reader = TableReader::new(
            Arc::new(modes),
            db.clone(),
            Arc::new(remote),
            Arc::new(RecordCache::new(Some(Duration::from_secs(60)))),
        );
        (reader, db, dir)
    }

    #[tokio::test]
    async fn local_mode_never_touches_remote() {
        let mut store = MockRemoteStore::new();
        store.expect_read_records().never();

        let (reader, _db, _dir) = reader(false, store).await;
        let outcome = reader.fetch(TableName::Users).await.unwrap();
        assert_eq!(outcome.source, StoreMode::Local);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].get("username").as_text().as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let mut store = MockRemoteStore::new();
        store
            .expect_read_records()
            .times(1)
            .returning(|_| Ok(vec![Record::new().with("id", "t_Math")]));

        let (reader, _db, _dir) = reader(true, store).await;
        let first = reader.fetch(TableName::Subjects).await.unwrap();
        let second = reader.fetch(TableName::Subjects).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.rows, second.rows);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_empty_uncached_result() {
        let mut store = MockRemoteStore::new();
        store
            .expect_read_records()
            .times(6)
            .returning(|_| Err(RemoteError::Transient("503".to_string())));

        let (reader, _db, _dir) = reader(true, store).await;
        for _ in 0..2 {
            let outcome = reader.fetch(TableName::Grades).await.unwrap();
            assert!(outcome.rows.is_empty());
            assert!(matches!(outcome.warning, Some(AppError::RemoteTransient(_))));
        }
    }
}
