//! Data layer module
//!
//! Handles local persistence and caching:
//! - Fixed table schemas
//! - Untyped records and typed row views
//! - SQLite database operations
//! - Record cache (volatile)

mod cache;
mod database;
mod models;
mod schema;

pub use cache::{CacheStats, CachedTable, RecordCache};
pub use database::Database;
pub use models::*;
pub use schema::{TableName, cells_in_column_order, normalize_identifiers};
