//! Common test utilities for integration tests

#![allow(dead_code)]

pub mod fake_sheets;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rollbook::config::{
    AdminConfig, AppConfig, CacheConfig, ConnectivityConfig, DatabaseConfig, LoggingConfig,
    RemoteConfig,
};
use rollbook::connectivity::{ConnectivityProbe, ModeSelector, Reachability};
use rollbook::data::{Database, Record, TableName, Value};
use rollbook::remote::{RemoteConnector, RemoteError, RemoteStore, RemoteStoreClient};
use rollbook::StoreContext;
use serde_json::Value as JsonValue;
use tempfile::TempDir;

/// Probe whose answer is flipped by the test
pub struct SwitchableReachability {
    online: Arc<AtomicBool>,
    probes: AtomicUsize,
}

#[async_trait]
impl Reachability for SwitchableReachability {
    async fn is_reachable(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

/// Call counters for [`FakeRemote`]
#[derive(Debug, Default)]
pub struct RemoteCalls {
    pub reads: AtomicUsize,
    pub clears: AtomicUsize,
    pub appends: AtomicUsize,
    pub creates: AtomicUsize,
}

impl RemoteCalls {
    pub fn total(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
            + self.clears.load(Ordering::SeqCst)
            + self.appends.load(Ordering::SeqCst)
            + self.creates.load(Ordering::SeqCst)
    }
}

/// In-memory spreadsheet: one grid (header row + data rows) per table.
///
/// Cells are held as JSON, the way the Sheets API returns them, and go
/// through the same `Value` cell mapping as the real client.
#[derive(Default)]
pub struct FakeRemote {
    grids: Mutex<HashMap<TableName, Vec<Vec<JsonValue>>>>,
    /// Errors returned, in order, before operations start succeeding again
    failures: Mutex<VecDeque<RemoteError>>,
    /// Error returned by every read of these tables
    broken_tables: Mutex<HashMap<TableName, RemoteError>>,
    pub calls: RemoteCalls,
}

impl FakeRemote {
    /// Remote with every collection present and empty apart from its header
    pub fn with_all_collections() -> Self {
        let remote = Self::default();
        {
            let mut grids = remote.grids.lock().unwrap();
            for table in TableName::ALL {
                grids.insert(table, vec![header(table)]);
            }
        }
        remote
    }

    pub fn has_collection(&self, table: TableName) -> bool {
        self.grids.lock().unwrap().contains_key(&table)
    }

    pub fn drop_collection(&self, table: TableName) {
        self.grids.lock().unwrap().remove(&table);
    }

    /// Replace a collection with header + `rows`
    pub fn seed(&self, table: TableName, rows: &[Record]) {
        let mut grid = vec![header(table)];
        grid.extend(rows.iter().map(|record| {
            table
                .columns()
                .iter()
                .map(|column| record.get(column).to_json())
                .collect()
        }));
        self.grids.lock().unwrap().insert(table, grid);
    }

    pub fn grid(&self, table: TableName) -> Option<Vec<Vec<JsonValue>>> {
        self.grids.lock().unwrap().get(&table).cloned()
    }

    /// Data rows as records, bypassing call counters and failures
    pub fn records(&self, table: TableName) -> Vec<Record> {
        self.grid(table).map(grid_records).unwrap_or_default()
    }

    pub fn fail_next(&self, error: RemoteError, times: usize) {
        let mut failures = self.failures.lock().unwrap();
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    pub fn break_table(&self, table: TableName, error: RemoteError) {
        self.broken_tables.lock().unwrap().insert(table, error);
    }

    fn injected_failure(&self) -> Option<RemoteError> {
        self.failures.lock().unwrap().pop_front()
    }
}

fn header(table: TableName) -> Vec<JsonValue> {
    table
        .columns()
        .iter()
        .map(|c| JsonValue::String(c.to_string()))
        .collect()
}

fn to_grid(rows: Vec<Vec<Value>>) -> Vec<Vec<JsonValue>> {
    rows.into_iter()
        .map(|row| row.iter().map(Value::to_json).collect())
        .collect()
}

fn grid_records(grid: Vec<Vec<JsonValue>>) -> Vec<Record> {
    let mut rows = grid.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    rows.map(|row| {
        header
            .iter()
            .zip(row)
            .filter_map(|(column, cell)| Some((column.as_str()?, Value::from_json(cell))))
            .collect::<Record>()
    })
    .filter(|record| !record.is_empty())
    .collect()
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn read_records(&self, table: TableName) -> Result<Vec<Record>, RemoteError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.injected_failure() {
            return Err(error);
        }
        if let Some(error) = self.broken_tables.lock().unwrap().get(&table) {
            return Err(error.clone());
        }
        match self.grid(table) {
            Some(grid) => Ok(grid_records(grid)),
            None => Err(RemoteError::CollectionMissing(table.as_str().to_string())),
        }
    }

    async fn clear(&self, table: TableName) -> Result<(), RemoteError> {
        self.calls.clears.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.injected_failure() {
            return Err(error);
        }
        match self.grids.lock().unwrap().get_mut(&table) {
            Some(grid) => {
                grid.clear();
                Ok(())
            }
            None => Err(RemoteError::CollectionMissing(table.as_str().to_string())),
        }
    }

    async fn append_rows(
        &self,
        table: TableName,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), RemoteError> {
        self.calls.appends.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.injected_failure() {
            return Err(error);
        }
        match self.grids.lock().unwrap().get_mut(&table) {
            Some(grid) => {
                grid.extend(to_grid(rows));
                Ok(())
            }
            None => Err(RemoteError::CollectionMissing(table.as_str().to_string())),
        }
    }

    async fn create_collection(
        &self,
        table: TableName,
        seed: Vec<Vec<Value>>,
    ) -> Result<(), RemoteError> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let mut grid = vec![header(table)];
        grid.extend(to_grid(seed));
        self.grids.lock().unwrap().insert(table, grid);
        Ok(())
    }
}

/// Connector handing out the shared [`FakeRemote`]
pub struct FakeConnector {
    remote: Arc<FakeRemote>,
    pub refuse: AtomicBool,
    pub connects: AtomicUsize,
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RemoteError::Fatal("invalid_grant: token revoked".to_string()));
        }
        Ok(self.remote.clone() as Arc<dyn RemoteStore>)
    }
}

/// Configuration for a store rooted in `dir`
pub fn test_config(dir: &TempDir) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: dir.path().join("rollbook.db"),
        },
        remote: RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            spreadsheet_id: None,
            access_token: None,
            request_timeout_seconds: 5,
            max_attempts: 3,
            retry_backoff_ms: 1,
        },
        connectivity: ConnectivityConfig {
            target: "127.0.0.1:9".to_string(),
            timeout_ms: 50,
            ttl_seconds: 0,
        },
        cache: CacheConfig { ttl_seconds: 60 },
        admin: AdminConfig {
            username: "admin".to_string(),
            password: "admin".to_string(),
            role: "Admin".to_string(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Store wired to a [`FakeRemote`] and a switchable probe
pub struct TestContext {
    pub store: StoreContext,
    pub remote: Arc<FakeRemote>,
    pub connector: Arc<FakeConnector>,
    pub online: Arc<AtomicBool>,
    pub dir: TempDir,
}

impl TestContext {
    pub async fn new(online: bool) -> Self {
        Self::with_remote(online, FakeRemote::with_all_collections(), |_| {}).await
    }

    pub async fn with_remote(
        online: bool,
        remote: FakeRemote,
        tweak: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        tweak(&mut config);
        Self::open(dir, config, Arc::new(remote), online).await
    }

    /// Open a context on an existing directory (simulates a restart)
    pub async fn open(dir: TempDir, config: AppConfig, remote: Arc<FakeRemote>, online: bool) -> Self {
        let online = Arc::new(AtomicBool::new(online));
        let probe = ConnectivityProbe::new(
            Arc::new(SwitchableReachability {
                online: online.clone(),
                probes: AtomicUsize::new(0),
            }),
            Duration::ZERO,
        );
        let connector = Arc::new(FakeConnector {
            remote: remote.clone(),
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        });

        let db = Database::connect(&config.database.path).await.unwrap();
        let store = StoreContext::from_parts(
            config,
            db,
            ModeSelector::new(probe),
            RemoteStoreClient::new(connector.clone()),
        )
        .await
        .unwrap();

        Self {
            store,
            remote,
            connector,
            online,
            dir,
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn local_rows(&self, table: TableName) -> Vec<Record> {
        self.store.db.read_all(table).await.unwrap()
    }
}

pub fn grade(id: &str, student_id: &str, total: f64) -> Record {
    Record::new()
        .with("id", id)
        .with("student_id", student_id)
        .with("subject", "Math")
        .with("quarter", "Q1")
        .with("school_year", "2024-2025")
        .with("test1", 10.0)
        .with("test2", 12.0)
        .with("test3", 8.0)
        .with("final_score", 40.0)
        .with("total_score", total)
        .with("recorded_by", "teacher1")
}

pub fn student(student_id: &str, name: &str) -> Record {
    Record::new()
        .with("student_id", student_id)
        .with("student_name", name)
        .with("class_no", 1_i64)
        .with("grade_level", "M.1")
        .with("room", "1")
        .with("status", "Active")
}
