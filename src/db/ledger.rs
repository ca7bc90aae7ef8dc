//! Ledger of retrieved episodes, keyed by deduplication key.

use crate::error::DatabaseError;
use crate::types::LedgerEntry;
use crate::{Error, Result};

use super::{Database, LedgerRow};

impl Database {
    /// Check whether an episode key has been recorded
    pub async fn ledger_contains(&self, key: &str) -> Result<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ledger_entries WHERE key = ?)")
                .bind(key)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check ledger entry: {}",
                        e
                    )))
                })?;

        Ok(exists != 0)
    }

    /// Record a retrieved episode
    ///
    /// Recording an existing key refreshes its title, target and timestamp; it never
    /// creates a second row.
    pub async fn record_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let retrieved_at = entry.retrieved_at.timestamp();
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (key, title, retrieval_target, retrieved_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                title = excluded.title,
                retrieval_target = excluded.retrieval_target,
                retrieved_at = excluded.retrieved_at
            "#,
        )
        .bind(entry.key.as_str())
        .bind(&entry.title)
        .bind(&entry.retrieval_target)
        .bind(retrieved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record ledger entry: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get a single ledger row
    pub async fn get_ledger_entry(&self, key: &str) -> Result<Option<LedgerRow>> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT key, title, retrieval_target, retrieved_at
            FROM ledger_entries
            WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get ledger entry: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Number of recorded episodes
    pub async fn count_ledger_entries(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count ledger entries: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
