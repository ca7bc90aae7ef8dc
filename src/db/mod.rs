//! Database layer for c2c-dl
//!
//! Handles SQLite persistence for the deduplication ledger and cycle history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`ledger`]: Retrieved-episode identities
//! - [`cycles`]: Polling cycle history

use sqlx::{FromRow, sqlite::SqlitePool};

mod cycles;
mod ledger;
mod migrations;

/// Ledger row from database
#[derive(Debug, Clone, FromRow)]
pub struct LedgerRow {
    /// Hex deduplication key
    pub key: String,
    /// Episode title at retrieval time
    pub title: String,
    /// Target the episode was retrieved from
    pub retrieval_target: String,
    /// Unix timestamp of the (latest) retrieval
    pub retrieved_at: i64,
}

/// Cycle history row from database
#[derive(Debug, Clone, FromRow)]
pub struct CycleRecord {
    /// Unique database ID
    pub id: i64,
    /// Unix timestamp when the cycle started
    pub started_at: i64,
    /// Unix timestamp when the cycle finished, if it did
    pub finished_at: Option<i64>,
    /// Episodes retrieved during the cycle
    pub retrieved: i64,
    /// Pages fetched during the cycle
    pub pages: i64,
    /// Error that ended the cycle early
    pub error_message: Option<String>,
}

/// Database handle for c2c-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
