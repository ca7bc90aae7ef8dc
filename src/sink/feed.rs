//! RSS 2.0 podcast feed over the download directory

use super::PublicationSink;
use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::types::EpisodeRecord;
use async_trait::async_trait;
use chrono::Utc;
use rss::extension::itunes::{ITunesCategoryBuilder, ITunesChannelExtensionBuilder};
use rss::{Channel, ChannelBuilder, EnclosureBuilder, GuidBuilder, Item, ItemBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

const ENCLOSURE_MIME: &str = "video/mp4";

/// Writes `podcast_feed.xml` listing every media file in the download directory
///
/// The feed is rebuilt from the directory on every publish, so it also covers
/// episodes retrieved by earlier runs. Items are ordered by file name, descending.
#[derive(Clone, Debug)]
pub struct FeedSink {
    config: FeedConfig,
    download_dir: PathBuf,
    extension: String,
}

impl FeedSink {
    /// Feed over `download_dir` for media files with `extension`
    pub fn new(config: FeedConfig, download_dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            config,
            download_dir: download_dir.into(),
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    /// Public URL of a file under `/downloads/`
    fn file_url(&self, file_name: &str) -> String {
        match Url::parse(&self.config.base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("downloads").push(file_name);
                }
                url.to_string()
            }
            Err(_) => format!(
                "{}/downloads/{}",
                self.config.base_url.trim_end_matches('/'),
                file_name
            ),
        }
    }

    /// Media files in the download directory, newest name first
    async fn media_files(&self) -> Result<Vec<(String, u64)>> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let matches_extension = Path::new(&name)
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().to_ascii_lowercase() == self.extension);
            if !matches_extension {
                continue;
            }
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                files.push((name, metadata.len()));
            }
        }

        files.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(files)
    }

    fn item(&self, file_name: &str, size: u64, published: &str) -> Item {
        let title = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let url = self.file_url(file_name);

        ItemBuilder::default()
            .title(Some(title.clone()))
            .link(Some(url.clone()))
            .description(Some(title))
            .guid(Some(GuidBuilder::default().value(url.clone()).permalink(true).build()))
            .pub_date(Some(published.to_string()))
            .enclosure(Some(
                EnclosureBuilder::default()
                    .url(url)
                    .length(size.to_string())
                    .mime_type(ENCLOSURE_MIME.to_string())
                    .build(),
            ))
            .build()
    }

    /// Build the channel from the current directory contents
    pub async fn build_channel(&self) -> Result<Channel> {
        let published = Utc::now().to_rfc2822();
        let items: Vec<Item> = self
            .media_files()
            .await?
            .iter()
            .map(|(name, size)| self.item(name, *size, &published))
            .collect();

        let subcategory = self.config.itunes_subcategory.as_ref().map(|sub| {
            Box::new(ITunesCategoryBuilder::default().text(sub.clone()).build())
        });
        let category = ITunesCategoryBuilder::default()
            .text(self.config.itunes_category.clone())
            .subcategory(subcategory)
            .build();
        let itunes = ITunesChannelExtensionBuilder::default()
            .categories(vec![category])
            .explicit(Some(if self.config.explicit { "yes" } else { "no" }.to_string()))
            .build();

        Ok(ChannelBuilder::default()
            .title(self.config.title.clone())
            .link(self.config.base_url.clone())
            .description(self.config.description.clone())
            .language(Some(self.config.language.clone()))
            .last_build_date(Some(published))
            .itunes_ext(Some(itunes))
            .items(items)
            .build())
    }

    /// Regenerate the feed file
    pub async fn write(&self) -> Result<usize> {
        let channel = self.build_channel().await?;
        let count = channel.items().len();

        if let Some(parent) = self.config.output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.config.output_path, channel.to_string())
            .await
            .map_err(|e| {
                Error::Sink(format!(
                    "failed to write feed {}: {}",
                    self.config.output_path.display(),
                    e
                ))
            })?;

        info!(
            path = %self.config.output_path.display(),
            items = count,
            "Podcast feed written"
        );
        Ok(count)
    }
}

#[async_trait]
impl PublicationSink for FeedSink {
    fn name(&self) -> &'static str {
        "feed"
    }

    async fn publish(&self, episodes: &[EpisodeRecord]) -> Result<()> {
        debug!(new_episodes = episodes.len(), "Regenerating podcast feed");
        self.write().await.map(|_| ())
    }
}
