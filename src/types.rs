//! Core types and events for c2c-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// One episode discovered on a listing page
///
/// Created by the extractor, enriched with a `retrieval_target` by the resolver,
/// and handed to the publication sink once retrieved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Source-provided title
    pub title: String,

    /// Date-like token (normalized to `YYYY-MM-DD` when parseable) or leading title segment
    pub publish_token: String,

    /// Detail-page URL or raw link found on the listing page
    pub source_reference: String,

    /// Direct-download, magnet or torrent URL; absent until resolved
    pub retrieval_target: Option<String>,

    /// Free text accompanying the entry, used for the descriptive side file
    pub notes: Option<String>,
}

impl EpisodeRecord {
    /// Create an unresolved record, deriving the publish token from the title
    pub fn new(title: impl Into<String>, source_reference: impl Into<String>) -> Self {
        let title = title.into();
        let publish_token = crate::utils::publish_token(&title);
        Self {
            title,
            publish_token,
            source_reference: source_reference.into(),
            retrieval_target: None,
            notes: None,
        }
    }

    /// Identity used by the deduplication ledger
    pub fn key(&self) -> DeduplicationKey {
        DeduplicationKey::derive(&self.title, &self.publish_token)
    }

    /// File name the episode is stored under, without directory
    pub fn file_name(&self, extension: &str) -> String {
        crate::utils::episode_file_name(&self.title, &self.publish_token, extension)
    }
}

/// Stable identity of an episode, independent of when it was retrieved
///
/// SHA-256 over the episode's file stem, so two records that would be stored under
/// the same file share one key. Nothing time-dependent goes in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeduplicationKey(String);

impl DeduplicationKey {
    /// Derive the key for a `(title, publish_token)` pair
    pub fn derive(title: &str, publish_token: &str) -> Self {
        let stem = crate::utils::episode_file_stem(title, publish_token.trim());
        let mut hasher = Sha256::new();
        hasher.update(stem.as_bytes());
        let digest = hasher.finalize();
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(hex)
    }

    /// Hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeduplicationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the ledger remembers about a retrieved episode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Episode identity
    pub key: DeduplicationKey,
    /// Title at retrieval time
    pub title: String,
    /// Target the payload was obtained from
    pub retrieval_target: String,
    /// When the retrieval completed
    pub retrieved_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Entry for a record retrieved now
    pub fn for_record(record: &EpisodeRecord, retrieval_target: &str) -> Self {
        Self {
            key: record.key(),
            title: record.title.clone(),
            retrieval_target: retrieval_target.to_string(),
            retrieved_at: Utc::now(),
        }
    }
}

/// Progress events broadcast to subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A polling cycle began
    CycleStarted {
        /// 1-based cycle number within this process
        cycle: u64,
        /// First page of the cycle
        url: String,
    },

    /// A candidate was already in the ledger
    EpisodeSkipped {
        /// Episode title
        title: String,
    },

    /// An episode was retrieved (or accepted for hand-off)
    EpisodeRetrieved {
        /// Episode title
        title: String,
        /// Resolved target
        target: String,
        /// Local file, when downloaded
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },

    /// Resolution or retrieval failed; the episode stays eligible next cycle
    EpisodeFailed {
        /// Episode title
        title: String,
        /// Failure description
        error: String,
    },

    /// A polling cycle ended
    CycleFinished {
        /// 1-based cycle number within this process
        cycle: u64,
        /// Episodes retrieved during the cycle
        retrieved: usize,
        /// Error that cut the cycle short, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
