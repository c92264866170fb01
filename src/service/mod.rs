//! Service layer
//!
//! Orchestrates the mode selector, local database, remote store and cache
//! for the read, write and login-sync paths.

mod reader;
mod remote_session;
mod sync;
mod writer;

pub use reader::{ReadOutcome, TableReader};
pub use remote_session::{RemoteGateway, RemoteSession, RetryPolicy};
pub use sync::{SyncEngine, SyncReport, TableSyncResult, TableSyncStatus};
pub use writer::{RemoteWrite, TableWriter, WriteOutcome};
