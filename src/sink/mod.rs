//! Publication sinks: where a cycle's new episodes go
//!
//! - [`FeedSink`] regenerates the podcast feed over the download directory
//! - [`QbittorrentSink`] hands resolved links to a qBittorrent instance
//!
//! A sink receives the cycle's records in document order, each with its
//! `retrieval_target` set. Sinks never see a record twice unless the previous
//! hand-off failed.

use crate::error::Result;
use crate::types::EpisodeRecord;
use async_trait::async_trait;

mod feed;
mod qbittorrent;

pub use feed::FeedSink;
pub use qbittorrent::QbittorrentSink;

/// Receiver for the new episodes of a cycle
#[async_trait]
pub trait PublicationSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Publish a finalized, ordered list of episodes
    ///
    /// An [`crate::Error::Authentication`] failure aborts the whole batch.
    async fn publish(&self, episodes: &[EpisodeRecord]) -> Result<()>;
}
