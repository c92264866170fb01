//! Fixed table definitions
//!
//! The seven tables and their column order are shared by the local
//! SQLite schema and the header row of each remote collection.

use std::fmt;
use std::str::FromStr;

use crate::config::AdminConfig;
use crate::error::AppError;

use super::models::{Record, Value};

/// One of the predefined tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableName {
    Users,
    Subjects,
    Students,
    Grades,
    Tasks,
    Config,
    Attendance,
}

const USERS_COLUMNS: &[&str] = &["username", "password", "role", "profile_pic"];
const SUBJECTS_COLUMNS: &[&str] = &["id", "teacher_username", "subject_name"];
const STUDENTS_COLUMNS: &[&str] = &[
    "student_id",
    "student_name",
    "class_no",
    "grade_level",
    "room",
    "photo",
    "password",
    "status",
];
const GRADES_COLUMNS: &[&str] = &[
    "id",
    "student_id",
    "subject",
    "quarter",
    "school_year",
    "test1",
    "test2",
    "test3",
    "final_score",
    "total_score",
    "recorded_by",
    "timestamp",
];
const TASKS_COLUMNS: &[&str] = &[
    "uid",
    "student_id",
    "subject",
    "quarter",
    "school_year",
    "test_name",
    "t1",
    "t2",
    "t3",
    "t4",
    "t5",
    "t6",
    "t7",
    "t8",
    "t9",
    "t10",
    "raw_total",
];
const CONFIG_COLUMNS: &[&str] = &[
    "uid",
    "subject",
    "quarter",
    "year",
    "test_name",
    "task_name",
    "max_score",
];
const ATTENDANCE_COLUMNS: &[&str] = &[
    "uid",
    "student_id",
    "student_name",
    "subject",
    "date",
    "status",
    "recorded_by",
    "timestamp",
];

/// Columns holding identifiers; read paths render them as trimmed text.
const IDENTIFIER_COLUMNS: &[&str] = &[
    "id",
    "uid",
    "student_id",
    "username",
    "teacher_username",
    "recorded_by",
];

impl TableName {
    /// Every table, in bootstrap order
    pub const ALL: [TableName; 7] = [
        TableName::Users,
        TableName::Subjects,
        TableName::Students,
        TableName::Grades,
        TableName::Tasks,
        TableName::Config,
        TableName::Attendance,
    ];

    /// Tables mirrored from Remote into Local on login
    pub const SYNCED: [TableName; 6] = [
        TableName::Users,
        TableName::Subjects,
        TableName::Students,
        TableName::Grades,
        TableName::Tasks,
        TableName::Config,
    ];

    /// Collection / worksheet name
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Users => "Users",
            TableName::Subjects => "Subjects",
            TableName::Students => "Students",
            TableName::Grades => "Grades",
            TableName::Tasks => "Tasks",
            TableName::Config => "Config",
            TableName::Attendance => "Attendance",
        }
    }

    /// SQLite table name
    pub fn sql_name(&self) -> &'static str {
        match self {
            TableName::Users => "users",
            TableName::Subjects => "subjects",
            TableName::Students => "students",
            TableName::Grades => "grades",
            TableName::Tasks => "tasks",
            TableName::Config => "config",
            TableName::Attendance => "attendance",
        }
    }

    /// Declared column order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TableName::Users => USERS_COLUMNS,
            TableName::Subjects => SUBJECTS_COLUMNS,
            TableName::Students => STUDENTS_COLUMNS,
            TableName::Grades => GRADES_COLUMNS,
            TableName::Tasks => TASKS_COLUMNS,
            TableName::Config => CONFIG_COLUMNS,
            TableName::Attendance => ATTENDANCE_COLUMNS,
        }
    }

    /// Rows written into a table the first time it is created.
    ///
    /// Only Users is seeded, with the configured administrator.
    pub fn seed_rows(&self, admin: &AdminConfig) -> Vec<Record> {
        match self {
            TableName::Users => {
                let mut record = Record::new();
                record.insert("username", Value::from(admin.username.trim()));
                record.insert("password", Value::from(admin.password.as_str()));
                record.insert("role", Value::from(admin.role.as_str()));
                vec![record]
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        TableName::ALL
            .into_iter()
            .find(|table| {
                table.as_str().eq_ignore_ascii_case(trimmed)
                    || table.sql_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| AppError::UnknownTable(trimmed.to_string()))
    }
}

/// Render identifier columns as trimmed text, in place.
pub fn normalize_identifiers(record: &mut Record) {
    for column in IDENTIFIER_COLUMNS.iter().copied() {
        let Some(value) = record.get_opt(column) else {
            continue;
        };
        let normalized = value.to_identifier();
        record.insert(column, normalized);
    }
}

/// Order a record's cells by the table's declared columns.
///
/// Cells outside the schema are dropped; absent cells become [`Value::Null`].
pub fn cells_in_column_order(table: TableName, record: &Record) -> Vec<Value> {
    table
        .columns()
        .iter()
        .map(|column| record.get(column).clone())
        .collect()
}
