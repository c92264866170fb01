//! Minimal fake of the Sheets v4 REST surface used by `SheetsStore`

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value as JsonValue, json};
use tokio::net::TcpListener;

#[derive(Default)]
struct Sheets {
    grids: HashMap<String, Vec<Vec<JsonValue>>>,
    /// Statuses returned, in order, by the next data requests
    failures: VecDeque<StatusCode>,
    requests: Vec<String>,
}

#[derive(Clone)]
pub struct FakeSheets {
    pub spreadsheet_id: String,
    pub token: String,
    state: Arc<Mutex<Sheets>>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": { "code": status.as_u16(), "message": message, "status": "ERROR" }
        })),
    )
        .into_response()
}

impl FakeSheets {
    pub fn new() -> Self {
        Self {
            spreadsheet_id: "sheet-1".to_string(),
            token: "test-token".to_string(),
            state: Arc::new(Mutex::new(Sheets::default())),
        }
    }

    pub fn add_sheet(&self, title: &str, grid: Vec<Vec<JsonValue>>) {
        self.state
            .lock()
            .unwrap()
            .grids
            .insert(title.to_string(), grid);
    }

    pub fn sheet(&self, title: &str) -> Option<Vec<Vec<JsonValue>>> {
        self.state.lock().unwrap().grids.get(title).cloned()
    }

    pub fn fail_next(&self, status: StatusCode, times: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..times {
            state.failures.push_back(status);
        }
    }

    /// Requests seen so far, as "METHOD target"
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Serve on an ephemeral port; returns the API base URL
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/spreadsheets/:id", get(metadata).post(batch_update))
            .route("/spreadsheets/:id/values/:range", get(read_values).post(write_values))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    fn authorize(&self, headers: &HeaderMap, id: &str) -> Result<(), Response> {
        let expected = format!("Bearer {}", self.token);
        let authorized = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == expected);
        if !authorized {
            return Err(error(
                StatusCode::UNAUTHORIZED,
                "Request had invalid authentication credentials.",
            ));
        }
        if id != self.spreadsheet_id {
            return Err(error(StatusCode::NOT_FOUND, "Requested entity was not found."));
        }
        Ok(())
    }

    /// Authorize a data request, log it and pop any injected failure
    fn check(&self, headers: &HeaderMap, id: &str, request: String) -> Result<(), Response> {
        self.authorize(headers, id)?;
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);
        if let Some(status) = state.failures.pop_front() {
            return Err(error(status, "Quota exceeded"));
        }
        Ok(())
    }
}

fn sheet_title(range: &str) -> &str {
    range.split('!').next().unwrap_or(range)
}

async fn metadata(
    State(sheets): State<FakeSheets>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = sheets.authorize(&headers, &id) {
        return response;
    }
    Json(json!({ "spreadsheetId": id })).into_response()
}

async fn batch_update(
    State(sheets): State<FakeSheets>,
    Path(target): Path<String>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    let Some(id) = target.strip_suffix(":batchUpdate") else {
        return error(StatusCode::NOT_FOUND, "Unknown method");
    };
    if let Err(response) = sheets.check(&headers, id, format!("POST {target}")) {
        return response;
    }

    let Some(title) = body["requests"][0]["addSheet"]["properties"]["title"].as_str() else {
        return error(StatusCode::BAD_REQUEST, "Invalid requests[0]");
    };
    let mut state = sheets.state.lock().unwrap();
    if state.grids.contains_key(title) {
        return error(
            StatusCode::BAD_REQUEST,
            &format!("A sheet with the name \"{title}\" already exists."),
        );
    }
    state.grids.insert(title.to_string(), Vec::new());
    Json(json!({ "spreadsheetId": id, "replies": [{}] })).into_response()
}

async fn read_values(
    State(sheets): State<FakeSheets>,
    Path((id, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = sheets.check(&headers, &id, format!("GET {range}")) {
        return response;
    }

    let state = sheets.state.lock().unwrap();
    match state.grids.get(sheet_title(&range)) {
        Some(grid) if grid.is_empty() => {
            Json(json!({ "range": range, "majorDimension": "ROWS" })).into_response()
        }
        Some(grid) => {
            Json(json!({ "range": range, "majorDimension": "ROWS", "values": grid }))
                .into_response()
        }
        None => error(
            StatusCode::BAD_REQUEST,
            &format!("Unable to parse range: {range}"),
        ),
    }
}

async fn write_values(
    State(sheets): State<FakeSheets>,
    Path((id, target)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Err(response) = sheets.check(&headers, &id, format!("POST {target}")) {
        return response;
    }

    let mut state = sheets.state.lock().unwrap();
    if let Some(range) = target.strip_suffix(":clear") {
        return match state.grids.get_mut(sheet_title(range)) {
            Some(grid) => {
                grid.clear();
                Json(json!({ "clearedRange": range })).into_response()
            }
            None => error(
                StatusCode::BAD_REQUEST,
                &format!("Unable to parse range: {range}"),
            ),
        };
    }

    if let Some(range) = target.strip_suffix(":append") {
        let Some(grid) = state.grids.get_mut(sheet_title(range)) else {
            return error(
                StatusCode::BAD_REQUEST,
                &format!("Unable to parse range: {range}"),
            );
        };
        let rows = body["values"].as_array().cloned().unwrap_or_default();
        for row in rows {
            grid.push(row.as_array().cloned().unwrap_or_default());
        }
        return Json(json!({ "updates": { "updatedRange": range } })).into_response();
    }

    error(StatusCode::NOT_FOUND, "Unknown method")
}
