//! Retrying access to remote tables
//!
//! A [`RemoteSession`] wraps one connected handle. Every operation gets a
//! fixed attempt budget: transient faults sleep and retry, a missing
//! collection is created once and retried, anything else stops at once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AdminConfig, RemoteConfig};
use crate::data::{Record, TableName, cells_in_column_order, normalize_identifiers};
use crate::error::AppError;
use crate::metrics::observe_remote_attempt;
use crate::remote::{RemoteError, RemoteStore, RemoteStoreClient, header_row};

/// Attempt budget for one remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3)
    pub max_attempts: u32,
    /// Sleep after a transient failure (default: 1s)
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// Opens [`RemoteSession`]s on the shared remote client
pub struct RemoteGateway {
    client: Arc<RemoteStoreClient>,
    policy: RetryPolicy,
    admin: Arc<AdminConfig>,
}

impl RemoteGateway {
    pub fn new(client: Arc<RemoteStoreClient>, policy: RetryPolicy, admin: Arc<AdminConfig>) -> Self {
        Self {
            client,
            policy,
            admin,
        }
    }

    /// Connect (or reuse the cached handle) for one logical operation.
    ///
    /// # Errors
    /// [`AppError::RemoteFatal`] when the store cannot be opened
    pub async fn open(&self) -> Result<RemoteSession<'_>, AppError> {
        let store = self.client.connect().await?;
        Ok(RemoteSession {
            store,
            policy: self.policy,
            admin: &self.admin,
        })
    }
}

/// One connected handle plus the retry policy
pub struct RemoteSession<'a> {
    store: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
    admin: &'a AdminConfig,
}

impl RemoteSession<'_> {
    /// Read a whole remote table, identifiers normalized.
    pub async fn read_all(&self, table: TableName) -> Result<Vec<Record>, AppError> {
        let store = self.store.as_ref();
        let mut rows = self
            .run(table, "read", move || store.read_records(table))
            .await?;

        for record in &mut rows {
            normalize_identifiers(record);
        }
        Ok(rows)
    }

    /// Clear the remote table and rewrite it as header + `rows`.
    ///
    /// An empty `rows` leaves the collection fully cleared.
    pub async fn overwrite(&self, table: TableName, rows: &[Record]) -> Result<(), AppError> {
        let store = self.store.as_ref();
        self.run(table, "clear", move || store.clear(table)).await?;

        if rows.is_empty() {
            return Ok(());
        }

        let mut grid = Vec::with_capacity(rows.len() + 1);
        grid.push(header_row(table));
        grid.extend(rows.iter().map(|record| cells_in_column_order(table, record)));

        self.run(table, "append", move || store.append_rows(table, grid.clone()))
            .await?;
        Ok(())
    }

    /// Create the collection with its header (and admin seed for Users).
    async fn heal(&self, table: TableName) -> Result<(), RemoteError> {
        tracing::warn!(table = %table, "Remote collection missing; creating it");
        let seed = table
            .seed_rows(self.admin)
            .iter()
            .map(|record| cells_in_column_order(table, record))
            .collect();
        self.store.create_collection(table, seed).await
    }

    /// Run `op` under the retry policy.
    ///
    /// Transient failures are retried up to `max_attempts` times. A missing
    /// collection is healed at most once, and the attempt that reported it
    /// is given back, so the operation always runs again after a heal.
    async fn run<T, F, Fut>(
        &self,
        table: TableName,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut healed = false;
        let mut last_error = None;
        let mut budget = self.policy.max_attempts;
        let mut attempt = 0;

        while attempt < budget {
            attempt += 1;
            let error = match op().await {
                Ok(value) => {
                    observe_remote_attempt(operation, "success");
                    return Ok(value);
                }
                Err(error) => error,
            };
            observe_remote_attempt(operation, error.label());

            match error {
                RemoteError::CollectionMissing(_) if !healed => {
                    healed = true;
                    budget += 1;
                    match self.heal(table).await {
                        Ok(()) => {}
                        Err(RemoteError::Transient(message)) => {
                            tracing::warn!(table = %table, %message, "Collection creation hit a transient failure");
                            tokio::time::sleep(self.policy.backoff).await;
                        }
                        Err(heal_error) => return Err(heal_error.into()),
                    }
                    last_error = Some(error);
                }
                RemoteError::Transient(ref message) => {
                    tracing::warn!(
                        table = %table,
                        operation,
                        attempt,
                        max_attempts = budget,
                        %message,
                        "Transient remote failure"
                    );
                    if attempt < budget {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                    last_error = Some(error);
                }
                other => {
                    tracing::error!(table = %table, operation, error = %other, "Remote operation failed");
                    return Err(other.into());
                }
            }
        }

        let error = last_error.unwrap_or_else(|| RemoteError::Other("no attempts made".to_string()));
        tracing::error!(
            table = %table,
            operation,
            attempts = attempt,
            %error,
            "Remote retries exhausted"
        );
        Err(error.into())
    }
}
