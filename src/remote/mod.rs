//! Remote spreadsheet store
//!
//! Handles:
//! - The per-table collection protocol (read all, clear, append, create)
//! - Lazily establishing and caching the connection handle
//! - Google Sheets REST implementation

mod sheets;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::AppConfig;
use crate::data::{Record, TableName, Value};
use crate::error::AppError;

pub use sheets::{SheetsConnector, SheetsStore};

/// Failure reported by the remote store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The collection for this table does not exist yet
    #[error("collection {0} not found")]
    CollectionMissing(String),

    /// Rate limiting, server fault or network hiccup
    #[error("transient failure: {0}")]
    Transient(String),

    /// Credentials or target spreadsheet rejected
    #[error("{0}")]
    Fatal(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn label(&self) -> &'static str {
        match self {
            RemoteError::CollectionMissing(_) => "collection_missing",
            RemoteError::Transient(_) => "transient",
            RemoteError::Fatal(_) => "fatal",
            RemoteError::Other(_) => "other",
        }
    }
}

/// One connected remote spreadsheet, one collection per table.
///
/// Collections hold a header row (column names) followed by data rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every data row as column-keyed records
    async fn read_records(&self, table: TableName) -> Result<Vec<Record>, RemoteError>;

    /// Remove every row, header included
    async fn clear(&self, table: TableName) -> Result<(), RemoteError>;

    /// Append rows after the last non-empty row
    async fn append_rows(&self, table: TableName, rows: Vec<Vec<Value>>)
    -> Result<(), RemoteError>;

    /// Create the collection with the table's header followed by `seed` rows
    async fn create_collection(
        &self,
        table: TableName,
        seed: Vec<Vec<Value>>,
    ) -> Result<(), RemoteError>;
}

/// Opens a [`RemoteStore`] with externally supplied credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError>;
}

/// Connector used when no credentials are configured
struct Unconfigured;

#[async_trait]
impl RemoteConnector for Unconfigured {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        Err(RemoteError::Fatal(
            "remote store credentials are not configured".to_string(),
        ))
    }
}

/// Header row of a table's collection
pub fn header_row(table: TableName) -> Vec<Value> {
    table
        .columns()
        .iter()
        .map(|column| Value::from(*column))
        .collect()
}

/// Process-wide remote handle, connected on first use.
///
/// A failed connect is not remembered: the next operation tries again, the
/// current one surfaces [`AppError::RemoteFatal`].
pub struct RemoteStoreClient {
    connector: Arc<dyn RemoteConnector>,
    handle: OnceCell<Arc<dyn RemoteStore>>,
}

impl RemoteStoreClient {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            handle: OnceCell::new(),
        }
    }

    /// Client for the configured spreadsheet, or one that is always unavailable
    pub fn from_config(config: &AppConfig) -> Self {
        match SheetsConnector::from_config(&config.remote) {
            Some(connector) => Self::new(Arc::new(connector)),
            None => Self::new(Arc::new(Unconfigured)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.initialized()
    }

    /// Return the cached handle, connecting first if needed.
    pub async fn connect(&self) -> Result<Arc<dyn RemoteStore>, AppError> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                tracing::info!("Connecting to remote store");
                let store = self.connector.connect().await?;
                tracing::info!("Remote store connected");
                Ok::<_, RemoteError>(store)
            })
            .await
            .map_err(|error| {
                tracing::error!(%error, "Remote store unavailable");
                AppError::RemoteFatal(error.to_string())
            })?;

        Ok(handle.clone())
    }
}
