//! Data models
//!
//! The persistence core is untyped: a table is a sequence of [`Record`]s
//! mapping column names to scalar [`Value`]s. Business code decodes rows at
//! the boundary through [`TableRow`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::schema::TableName;
use crate::error::AppError;

// =============================================================================
// Value
// =============================================================================

/// Scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

static NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON cell from the remote store.
    ///
    /// Empty strings are how spreadsheets report blank cells, so they map to `Null`.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) if s.is_empty() => Value::Null,
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }

    /// JSON cell for the remote store; `Null` is written as an empty string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::String(String::new()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(n.to_string())),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Identifier form: trimmed text, integral numbers without a fractional part.
    pub fn to_identifier(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else {
                    Value::Text(trimmed.to_string())
                }
            }
            Value::Number(n) => Value::Text(format_number(*n)),
            Value::Bool(b) => Value::Text(b.to_string()),
        }
    }

    /// Text rendering, if the value is not null
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Bool(b) => Some(b.to_string()),
        }
    }

    /// Numeric reading; text cells are parsed leniently
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Null => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Record
// =============================================================================

/// A row: column name -> value.
///
/// `Null` and the empty string are never stored; inserting either removes
/// the column. A spreadsheet blank, a SQL NULL, an empty text cell and a
/// missing key all compare equal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        match value.into() {
            Value::Null => {
                self.0.remove(&column);
            }
            Value::Text(text) if text.is_empty() => {
                self.0.remove(&column);
            }
            value => {
                self.0.insert(column, value);
            }
        }
    }

    /// Builder-style [`Record::insert`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> &Value {
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn get_opt(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn text(&self, column: &str) -> Option<String> {
        self.get(column).as_text()
    }

    fn text_or_default(&self, column: &str) -> String {
        self.text(column).unwrap_or_default()
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    fn required_text(&self, table: TableName, column: &str) -> Result<String, AppError> {
        self.get(column)
            .to_identifier()
            .as_text()
            .ok_or_else(|| AppError::Validation(format!("{table} row is missing {column}")))
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(map: BTreeMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

// =============================================================================
// Typed rows
// =============================================================================

/// Typed view of one table's rows
pub trait TableRow: Sized {
    const TABLE: TableName;

    fn from_record(record: &Record) -> Result<Self, AppError>;

    fn to_record(&self) -> Record;
}

/// Staff account (Users)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub password: String,
    pub role: String,
    pub profile_pic: Option<String>,
}

impl TableRow for UserAccount {
    const TABLE: TableName = TableName::Users;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        Ok(Self {
            username: record.required_text(Self::TABLE, "username")?,
            password: record.text_or_default("password"),
            role: record.text_or_default("role"),
            profile_pic: record.text("profile_pic"),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("username", self.username.as_str())
            .with("password", self.password.as_str())
            .with("role", self.role.as_str())
            .with("profile_pic", self.profile_pic.clone())
    }
}

/// Subject taught by a teacher (Subjects)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub teacher_username: String,
    pub subject_name: String,
}

impl Subject {
    /// Subject ids are the teacher and subject name joined, without spaces.
    pub fn new(teacher_username: &str, subject_name: &str) -> Self {
        Self {
            id: format!("{teacher_username}_{subject_name}").replace(' ', ""),
            teacher_username: teacher_username.to_string(),
            subject_name: subject_name.to_string(),
        }
    }
}

impl TableRow for Subject {
    const TABLE: TableName = TableName::Subjects;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        Ok(Self {
            id: record.required_text(Self::TABLE, "id")?,
            teacher_username: record.text_or_default("teacher_username"),
            subject_name: record.text_or_default("subject_name"),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id.as_str())
            .with("teacher_username", self.teacher_username.as_str())
            .with("subject_name", self.subject_name.as_str())
    }
}

/// Enrolled student (Students)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub student_name: String,
    pub class_no: Option<i64>,
    pub grade_level: String,
    pub room: String,
    pub photo: Option<String>,
    pub password: Option<String>,
    pub status: String,
}

impl Student {
    pub const ACTIVE: &'static str = "Active";

    pub fn is_active(&self) -> bool {
        self.status == Self::ACTIVE
    }

    /// Password a student signs in with; defaults to the student id when unset.
    pub fn effective_password(&self) -> &str {
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => password,
            _ => &self.student_id,
        }
    }
}

impl TableRow for Student {
    const TABLE: TableName = TableName::Students;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        Ok(Self {
            student_id: record.required_text(Self::TABLE, "student_id")?,
            student_name: record.text_or_default("student_name"),
            class_no: record.number("class_no").map(|n| n as i64),
            grade_level: record.text_or_default("grade_level"),
            room: record.text_or_default("room"),
            photo: record.text("photo"),
            password: record.text("password"),
            status: record.text_or_default("status"),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("student_id", self.student_id.as_str())
            .with("student_name", self.student_name.as_str())
            .with("class_no", self.class_no)
            .with("grade_level", self.grade_level.as_str())
            .with("room", self.room.as_str())
            .with("photo", self.photo.clone())
            .with("password", self.password.clone())
            .with("status", self.status.as_str())
    }
}

/// Quarter grade for one student and subject (Grades)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub id: String,
    pub student_id: String,
    pub subject: String,
    pub quarter: String,
    pub school_year: String,
    pub test1: f64,
    pub test2: f64,
    pub test3: f64,
    pub final_score: f64,
    pub total_score: f64,
    pub recorded_by: String,
    pub timestamp: Option<String>,
}

impl TableRow for GradeEntry {
    const TABLE: TableName = TableName::Grades;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        Ok(Self {
            id: record.required_text(Self::TABLE, "id")?,
            student_id: record.required_text(Self::TABLE, "student_id")?,
            subject: record.text_or_default("subject"),
            quarter: record.text_or_default("quarter"),
            school_year: record.text_or_default("school_year"),
            test1: record.number("test1").unwrap_or(0.0),
            test2: record.number("test2").unwrap_or(0.0),
            test3: record.number("test3").unwrap_or(0.0),
            final_score: record.number("final_score").unwrap_or(0.0),
            total_score: record.number("total_score").unwrap_or(0.0),
            recorded_by: record.text_or_default("recorded_by"),
            timestamp: record.text("timestamp"),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id.as_str())
            .with("student_id", self.student_id.as_str())
            .with("subject", self.subject.as_str())
            .with("quarter", self.quarter.as_str())
            .with("school_year", self.school_year.as_str())
            .with("test1", self.test1)
            .with("test2", self.test2)
            .with("test3", self.test3)
            .with("final_score", self.final_score)
            .with("total_score", self.total_score)
            .with("recorded_by", self.recorded_by.as_str())
            .with("timestamp", self.timestamp.clone())
    }
}

/// Raw task scores t1..t10 for one test (Tasks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskScores {
    pub uid: String,
    pub student_id: String,
    pub subject: String,
    pub quarter: String,
    pub school_year: String,
    pub test_name: String,
    pub scores: [Option<f64>; 10],
    pub raw_total: Option<f64>,
}

const TASK_SCORE_COLUMNS: [&str; 10] = ["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10"];

impl TableRow for TaskScores {
    const TABLE: TableName = TableName::Tasks;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        let mut scores = [None; 10];
        for (slot, column) in scores.iter_mut().zip(TASK_SCORE_COLUMNS) {
            *slot = record.number(column);
        }

        Ok(Self {
            uid: record.required_text(Self::TABLE, "uid")?,
            student_id: record.required_text(Self::TABLE, "student_id")?,
            subject: record.text_or_default("subject"),
            quarter: record.text_or_default("quarter"),
            school_year: record.text_or_default("school_year"),
            test_name: record.text_or_default("test_name"),
            scores,
            raw_total: record.number("raw_total"),
        })
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("uid", self.uid.as_str())
            .with("student_id", self.student_id.as_str())
            .with("subject", self.subject.as_str())
            .with("quarter", self.quarter.as_str())
            .with("school_year", self.school_year.as_str())
            .with("test_name", self.test_name.as_str())
            .with("raw_total", self.raw_total);
        for (score, column) in self.scores.iter().zip(TASK_SCORE_COLUMNS) {
            record.insert(column, *score);
        }
        record
    }
}

/// Maximum score of one task within a test (Config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub uid: String,
    pub subject: String,
    pub quarter: String,
    pub year: String,
    pub test_name: String,
    pub task_name: String,
    pub max_score: f64,
}

impl TableRow for ScoreConfig {
    const TABLE: TableName = TableName::Config;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        Ok(Self {
            uid: record.required_text(Self::TABLE, "uid")?,
            subject: record.text_or_default("subject"),
            quarter: record.text_or_default("quarter"),
            year: record.text_or_default("year"),
            test_name: record.text_or_default("test_name"),
            task_name: record.text_or_default("task_name"),
            max_score: record.number("max_score").unwrap_or(0.0),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("uid", self.uid.as_str())
            .with("subject", self.subject.as_str())
            .with("quarter", self.quarter.as_str())
            .with("year", self.year.as_str())
            .with("test_name", self.test_name.as_str())
            .with("task_name", self.task_name.as_str())
            .with("max_score", self.max_score)
    }
}

/// Attendance mark for one student on one date (Attendance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub uid: String,
    pub student_id: String,
    pub student_name: String,
    pub subject: String,
    pub date: String,
    pub status: String,
    pub recorded_by: String,
    pub timestamp: Option<String>,
}

impl TableRow for AttendanceEntry {
    const TABLE: TableName = TableName::Attendance;

    fn from_record(record: &Record) -> Result<Self, AppError> {
        Ok(Self {
            uid: record.required_text(Self::TABLE, "uid")?,
            student_id: record.required_text(Self::TABLE, "student_id")?,
            student_name: record.text_or_default("student_name"),
            subject: record.text_or_default("subject"),
            date: record.text_or_default("date"),
            status: record.text_or_default("status"),
            recorded_by: record.text_or_default("recorded_by"),
            timestamp: record.text("timestamp"),
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("uid", self.uid.as_str())
            .with("student_id", self.student_id.as_str())
            .with("student_name", self.student_name.as_str())
            .with("subject", self.subject.as_str())
            .with("date", self.date.as_str())
            .with("status", self.status.as_str())
            .with("recorded_by", self.recorded_by.as_str())
            .with("timestamp", self.timestamp.clone())
    }
}

/// Decode a whole table snapshot
pub fn decode_rows<T: TableRow>(rows: &[Record]) -> Result<Vec<T>, AppError> {
    rows.iter().map(T::from_record).collect()
}

/// Encode typed rows for a full-replace write
pub fn encode_rows<T: TableRow>(rows: &[T]) -> Vec<Record> {
    rows.iter().map(TableRow::to_record).collect()
}
