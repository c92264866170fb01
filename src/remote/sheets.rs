//! Google Sheets REST backend
//!
//! One spreadsheet, one worksheet per table. Uses the v4 values API:
//! - `GET  values/{range}` to read (unformatted values, row-major)
//! - `POST values/{range}:clear`
//! - `POST values/{range}:append` (RAW input, insert rows)
//! - `POST :batchUpdate` with `addSheet` to create a worksheet

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{RemoteConnector, RemoteError, RemoteStore, header_row};
use crate::config::{RemoteConfig, non_empty};
use crate::data::{Record, TableName, Value};

/// Sheets reports a missing worksheet as a 400 with this message.
const MISSING_RANGE_MARKER: &str = "Unable to parse range";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Map an unsuccessful HTTP response onto the remote error kinds.
fn classify_status(status: StatusCode, body: &str, table: Option<TableName>) -> RemoteError {
    let message = error_message(body);

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return RemoteError::Transient(format!("HTTP {status}: {message}"));
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::Fatal(format!("remote store rejected credentials: {message}"))
        }
        StatusCode::BAD_REQUEST if message.contains(MISSING_RANGE_MARKER) => match table {
            Some(table) => RemoteError::CollectionMissing(table.as_str().to_string()),
            None => RemoteError::Other(message),
        },
        StatusCode::NOT_FOUND if table.is_none() => {
            RemoteError::Fatal(format!("spreadsheet not found: {message}"))
        }
        _ => RemoteError::Other(format!("HTTP {status}: {message}")),
    }
}

fn classify_transport(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        RemoteError::Transient(error.to_string())
    } else {
        RemoteError::Other(error.to_string())
    }
}

/// Turn a row-major grid into records keyed by the header row.
///
/// Rows whose cells are all blank are skipped.
fn grid_to_records(grid: Vec<Vec<serde_json::Value>>) -> Vec<Record> {
    let mut rows = grid.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<Option<String>> = header
        .into_iter()
        .map(|cell| Value::from_json(cell).as_text().map(|name| name.trim().to_string()))
        .collect();

    rows.filter_map(|row| {
        let record: Record = header
            .iter()
            .zip(row)
            .filter_map(|(column, cell)| Some((column.clone()?, Value::from_json(cell))))
            .collect();
        (!record.is_empty()).then_some(record)
    })
    .collect()
}

fn grid_to_json(rows: &[Vec<Value>]) -> serde_json::Value {
    serde_json::Value::Array(
        rows.iter()
            .map(|row| serde_json::Value::Array(row.iter().map(Value::to_json).collect()))
            .collect(),
    )
}

/// Connects to one spreadsheet with a bearer token
#[derive(Debug, Clone)]
pub struct SheetsConnector {
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
    timeout: Duration,
}

impl SheetsConnector {
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
            timeout,
        }
    }

    /// `None` when the spreadsheet id or token is missing
    pub fn from_config(config: &RemoteConfig) -> Option<Self> {
        let spreadsheet_id = non_empty(config.spreadsheet_id.as_deref())?;
        let access_token = non_empty(config.access_token.as_deref())?;
        Some(Self::new(
            config.base_url.as_str(),
            spreadsheet_id,
            access_token,
            config.request_timeout(),
        ))
    }
}

#[async_trait]
impl RemoteConnector for SheetsConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("Rollbook/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .map_err(|e| RemoteError::Fatal(format!("failed to build HTTP client: {e}")))?;

        let store = SheetsStore {
            http,
            base_url: self.base_url.clone(),
            spreadsheet_id: self.spreadsheet_id.clone(),
            access_token: self.access_token.clone(),
        };
        store.verify().await?;

        Ok(Arc::new(store))
    }
}

/// Connected spreadsheet
pub struct SheetsStore {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsStore {
    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(range)
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        table: Option<TableName>,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body, table))
    }

    /// Check that the token can open the spreadsheet
    async fn verify(&self) -> Result<(), RemoteError> {
        let request = self
            .http
            .get(self.spreadsheet_url())
            .query(&[("fields", "spreadsheetId")]);
        self.send(request, None).await.map_err(|error| match error {
            RemoteError::Fatal(message) => RemoteError::Fatal(message),
            other => RemoteError::Fatal(format!("failed to open spreadsheet: {other}")),
        })?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SheetsStore {
    async fn read_records(&self, table: TableName) -> Result<Vec<Record>, RemoteError> {
        let request = self.http.get(self.values_url(table.as_str())).query(&[
            ("valueRenderOption", "UNFORMATTED_VALUE"),
            ("majorDimension", "ROWS"),
        ]);
        let response = self.send(request, Some(table)).await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| RemoteError::Other(format!("malformed value range: {e}")))?;

        Ok(grid_to_records(range.values))
    }

    async fn clear(&self, table: TableName) -> Result<(), RemoteError> {
        let url = format!("{}:clear", self.values_url(table.as_str()));
        let request = self.http.post(url).json(&serde_json::json!({}));
        self.send(request, Some(table)).await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        table: TableName,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }

        let url = format!("{}:append", self.values_url(&format!("{}!A1", table.as_str())));
        let request = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({
                "majorDimension": "ROWS",
                "values": grid_to_json(&rows),
            }));
        self.send(request, Some(table)).await?;
        Ok(())
    }

    async fn create_collection(
        &self,
        table: TableName,
        seed: Vec<Vec<Value>>,
    ) -> Result<(), RemoteError> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let request = self.http.post(url).json(&serde_json::json!({
            "requests": [
                { "addSheet": { "properties": { "title": table.as_str() } } }
            ]
        }));
        self.send(request, Some(table)).await?;

        let mut rows = Vec::with_capacity(seed.len() + 1);
        rows.push(header_row(table));
        rows.extend(seed);
        self.append_rows(table, rows).await?;

        tracing::info!(table = %table, "Created remote collection");
        Ok(())
    }
}
