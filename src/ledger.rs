//! Deduplication ledger: which episodes have already been retrieved
//!
//! Two interchangeable backends give the same answer for the same inputs:
//! - [`SqliteLedger`] keeps an explicit index keyed by [`crate::types::DeduplicationKey`]
//! - [`FilesystemLedger`] checks whether the episode's output file already exists
//!
//! The orchestrator consults the ledger before any resolution or retrieval, and records
//! an entry only after a retrieval succeeded.

use crate::db::Database;
use crate::error::Result;
use crate::types::{EpisodeRecord, LedgerEntry};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Membership store for retrieved episodes
#[async_trait]
pub trait DeduplicationLedger: Send + Sync {
    /// Whether `record` was retrieved before
    async fn contains(&self, record: &EpisodeRecord) -> Result<bool>;

    /// Remember a successful retrieval; recording twice is harmless
    async fn record(&self, record: &EpisodeRecord, entry: &LedgerEntry) -> Result<()>;
}

/// Ledger backed by the `ledger_entries` table
#[derive(Clone)]
pub struct SqliteLedger {
    db: Arc<Database>,
}

impl SqliteLedger {
    /// Wrap an open database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeduplicationLedger for SqliteLedger {
    async fn contains(&self, record: &EpisodeRecord) -> Result<bool> {
        self.db.ledger_contains(record.key().as_str()).await
    }

    async fn record(&self, _record: &EpisodeRecord, entry: &LedgerEntry) -> Result<()> {
        self.db.record_ledger_entry(entry).await
    }
}

/// Ledger that treats the would-be output file as the record
///
/// Episodes handed to a download client never produce a local file, so recording one
/// leaves a `<file>.queued` marker next to where the file would be.
#[derive(Clone, Debug)]
pub struct FilesystemLedger {
    download_dir: PathBuf,
    extension: String,
}

impl FilesystemLedger {
    /// Ledger over `download_dir` for files with `extension`
    pub fn new(download_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            download_dir: download_dir.into(),
            extension: extension.into(),
        }
    }

    /// Output path the episode is (or would be) stored under
    pub fn output_path(&self, record: &EpisodeRecord) -> PathBuf {
        self.download_dir.join(record.file_name(&self.extension))
    }

    fn marker_path(&self, record: &EpisodeRecord) -> PathBuf {
        self.download_dir
            .join(format!("{}.queued", record.file_name(&self.extension)))
    }
}

#[async_trait]
impl DeduplicationLedger for FilesystemLedger {
    async fn contains(&self, record: &EpisodeRecord) -> Result<bool> {
        if tokio::fs::try_exists(self.output_path(record)).await? {
            return Ok(true);
        }
        Ok(tokio::fs::try_exists(self.marker_path(record)).await?)
    }

    async fn record(&self, record: &EpisodeRecord, entry: &LedgerEntry) -> Result<()> {
        if tokio::fs::try_exists(self.output_path(record)).await? {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.download_dir).await?;
        tokio::fs::write(self.marker_path(record), entry.retrieval_target.as_bytes()).await?;
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, tempdir};

    fn episode() -> EpisodeRecord {
        EpisodeRecord::new(
            "Coast to Coast AM - January 5, 2024",
            "https://host/file/d/ABC123/view",
        )
    }

    async fn sqlite_ledger(file: &NamedTempFile) -> SqliteLedger {
        SqliteLedger::new(Arc::new(Database::new(file.path()).await.unwrap()))
    }

    #[tokio::test]
    async fn sqlite_ledger_remembers_records() {
        let file = NamedTempFile::new().unwrap();
        let ledger = sqlite_ledger(&file).await;
        let record = episode();

        assert!(!ledger.contains(&record).await.unwrap());
        let entry = LedgerEntry::for_record(&record, "https://host/uc?export=download&id=ABC123");
        ledger.record(&record, &entry).await.unwrap();
        ledger.record(&record, &entry).await.unwrap();
        assert!(ledger.contains(&record).await.unwrap());
    }

    #[tokio::test]
    async fn filesystem_ledger_checks_output_path() {
        let dir = tempdir().unwrap();
        let ledger = FilesystemLedger::new(dir.path(), "mp4");
        let record = episode();

        assert!(!ledger.contains(&record).await.unwrap());
        std::fs::write(
            dir.path()
                .join("Coast to Coast AM - January 5, 2024 2024-01-05.mp4"),
            b"payload",
        )
        .unwrap();
        assert!(ledger.contains(&record).await.unwrap());
    }

    #[tokio::test]
    async fn filesystem_ledger_marks_delegated_episodes() {
        let dir = tempdir().unwrap();
        let ledger = FilesystemLedger::new(dir.path().join("downloads"), "mp4");
        let record = episode();

        let entry = LedgerEntry::for_record(&record, "magnet:?xt=urn:btih:AAA");
        ledger.record(&record, &entry).await.unwrap();

        assert!(ledger.contains(&record).await.unwrap());
        assert!(!ledger.output_path(&record).exists());
    }

    #[tokio::test]
    async fn backends_agree_for_same_inputs() {
        let dir = tempdir().unwrap();
        let file = NamedTempFile::new().unwrap();
        let fs_ledger = FilesystemLedger::new(dir.path(), "mp4");
        let db_ledger = sqlite_ledger(&file).await;

        let seen = episode();
        let unseen = EpisodeRecord::new("Coast to Coast AM - January 6, 2024", "ref");
        let entry = LedgerEntry::for_record(&seen, "target");
        fs_ledger.record(&seen, &entry).await.unwrap();
        db_ledger.record(&seen, &entry).await.unwrap();

        for record in [&seen, &unseen] {
            assert_eq!(
                fs_ledger.contains(record).await.unwrap(),
                db_ledger.contains(record).await.unwrap(),
                "backends disagree on {}",
                record.title
            );
        }
    }

    #[tokio::test]
    async fn backends_agree_on_titles_differing_in_reserved_characters() {
        let dir = tempdir().unwrap();
        let file = NamedTempFile::new().unwrap();
        let fs_ledger = FilesystemLedger::new(dir.path(), "mp4");
        let db_ledger = sqlite_ledger(&file).await;

        let recorded = EpisodeRecord::new("Coast: Aliens - January 5, 2024", "ref");
        std::fs::write(fs_ledger.output_path(&recorded), b"payload").unwrap();
        let entry = LedgerEntry::for_record(&recorded, "target");
        db_ledger.record(&recorded, &entry).await.unwrap();

        let lookalike = EpisodeRecord::new("Coast/ Aliens - January 5, 2024", "ref");
        assert!(fs_ledger.contains(&lookalike).await.unwrap());
        assert!(db_ledger.contains(&lookalike).await.unwrap());
    }
}
