//! Polling cycle history.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{CycleRecord, Database};

impl Database {
    /// Insert a cycle row at start time, returning its ID
    pub async fn start_cycle(&self) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("INSERT INTO cycles (started_at) VALUES (?)")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert cycle: {}",
                    e
                )))
            })?;

        Ok(result.last_insert_rowid())
    }

    /// Mark a cycle finished with its outcome
    pub async fn finish_cycle(
        &self,
        id: i64,
        retrieved: usize,
        pages: usize,
        error: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE cycles
            SET finished_at = ?, retrieved = ?, pages = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(retrieved as i64)
        .bind(pages as i64)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to finish cycle: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Most recent cycles, newest first
    pub async fn recent_cycles(&self, limit: i64) -> Result<Vec<CycleRecord>> {
        let rows = sqlx::query_as::<_, CycleRecord>(
            r#"
            SELECT id, started_at, finished_at, retrieved, pages, error_message
            FROM cycles
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list cycles: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Total episodes retrieved across all recorded cycles
    pub async fn total_retrieved(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(retrieved), 0) FROM cycles")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to sum retrieved episodes: {}",
                    e
                )))
            })?;

        Ok(total)
    }
}
