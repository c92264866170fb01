//! SQLite database operations
//!
//! The local store of last resort. Every table is created once with the
//! declared column order and is only ever read whole or replaced whole.

use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::path::Path;

use super::models::{Record, Value};
use super::schema::{TableName, normalize_identifiers};
use crate::config::AdminConfig;
use crate::error::AppError;

/// Bound parameters per statement; the conservative SQLite default.
const SQLITE_MAX_VARIABLES: usize = 999;

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(table: TableName) -> String {
    table
        .columns()
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SQLite has no boolean storage class. Booleans are kept as one-byte
/// blobs so they never collide with the text or numbers a caller wrote.
fn bool_blob(value: bool) -> Vec<u8> {
    vec![u8::from(value)]
}

/// Decode one cell by its SQLite storage class.
fn decode_cell(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage_class = raw.type_info().name().to_string();
    let value = match storage_class.as_str() {
        "INTEGER" => Value::Number(row.try_get::<i64, _>(index)? as f64),
        "REAL" => Value::Number(row.try_get::<f64, _>(index)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(index)?;
            match bytes.as_slice() {
                [0] => Value::Bool(false),
                [1] => Value::Bool(true),
                _ => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
            }
        }
        _ => Value::Text(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

/// Local store backed by a SQLite connection pool.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file and its parent directory if they don't exist.
    /// Tables are created separately by [`Database::ensure_schema`].
    ///
    /// # Errors
    /// Returns error if the directory or connection cannot be opened
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        tracing::info!(path = %path.display(), "Local database connected");

        Ok(Self { pool })
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Schema
    // =========================================================================

    async fn table_exists(&self, table: TableName) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table.sql_name())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Create every missing table, seeding a new Users table with the admin.
    ///
    /// Existing tables are never altered, so this is safe on every startup.
    ///
    /// # Returns
    /// The tables created by this call
    pub async fn ensure_schema(&self, admin: &AdminConfig) -> Result<Vec<TableName>, AppError> {
        let mut created = Vec::new();

        for table in TableName::ALL {
            if self.table_exists(table).await? {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                quote_ident(table.sql_name()),
                column_list(table)
            ))
            .execute(&mut *tx)
            .await?;

            let seeds = table.seed_rows(admin);
            if !seeds.is_empty() {
                insert_rows(&mut tx, table, &seeds).await?;
            }
            tx.commit().await?;

            tracing::info!(table = %table, seeded = seeds.len(), "Created local table");
            created.push(table);
        }

        Ok(created)
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Read every row of a table in insertion order.
    ///
    /// Identifier columns come back as trimmed text.
    pub async fn read_all(&self, table: TableName) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            column_list(table),
            quote_ident(table.sql_name())
        ))
        .fetch_all(&self.pool)
        .await?;

        let columns = table.columns();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Record::new();
            for (index, column) in columns.iter().enumerate() {
                record.insert(*column, decode_cell(row, index)?);
            }
            normalize_identifiers(&mut record);
            records.push(record);
        }

        Ok(records)
    }

    /// Replace the whole table with `rows`.
    ///
    /// Runs in one transaction; an empty slice leaves the table empty.
    /// Columns outside the table's schema are ignored.
    pub async fn replace_all(&self, table: TableName, rows: &[Record]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {}", quote_ident(table.sql_name())))
            .execute(&mut *tx)
            .await?;
        insert_rows(&mut tx, table, rows).await?;

        tx.commit().await?;

        tracing::debug!(table = %table, rows = rows.len(), "Replaced local table");
        Ok(())
    }

    /// Number of rows currently stored
    pub async fn row_count(&self, table: TableName) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            quote_ident(table.sql_name())
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

async fn insert_rows(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    table: TableName,
    rows: &[Record],
) -> Result<(), AppError> {
    let columns = table.columns();
    let rows_per_statement = (SQLITE_MAX_VARIABLES / columns.len()).max(1);

    for chunk in rows.chunks(rows_per_statement) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            quote_ident(table.sql_name()),
            column_list(table)
        ));

        builder.push_values(chunk, |mut values, record| {
            for column in columns {
                match record.get(column).clone() {
                    Value::Null => values.push_bind(None::<String>),
                    Value::Bool(b) => values.push_bind(bool_blob(b)),
                    Value::Number(n) => values.push_bind(n),
                    Value::Text(s) => values.push_bind(s),
                };
            }
        });

        builder.build().execute(&mut **tx).await?;
    }

    Ok(())
}
