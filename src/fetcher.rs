//! HTTP boundary: listing/detail page fetches and media payload downloads
//!
//! Neither operation retries on its own. Page fetch retries are applied by the
//! orchestrator through [`crate::retry`]; failed payload downloads are left for the
//! next cycle.

use crate::config::{RetrievalConfig, SourceConfig};
use crate::error::{Error, FetchError, Result, RetrievalError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Fetches the HTML of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body as text; non-2xx is an error
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// Downloads a media payload to a local path
#[async_trait]
pub trait MediaRetriever: Send + Sync {
    /// Download `url` to `destination`, returning the number of bytes written
    ///
    /// `destination` only appears once the payload is complete.
    async fn retrieve(
        &self,
        url: &str,
        destination: &Path,
    ) -> std::result::Result<u64, RetrievalError>;
}

/// reqwest-backed implementation of [`PageFetcher`] and [`MediaRetriever`]
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    page_timeout: Duration,
    download_timeout: Duration,
    temp_dir: PathBuf,
}

impl HttpClient {
    /// Build a client with the source's user agent and the configured timeouts
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(source: &SourceConfig, retrieval: &RetrievalConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(source.user_agent.clone())
            .connect_timeout(retrieval.connect_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            page_timeout: retrieval.page_timeout,
            download_timeout: retrieval.download_timeout,
            temp_dir: retrieval.temp_dir.clone(),
        })
    }

    /// Partial-download path for a destination
    fn temp_path(&self, destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "payload".to_string());
        self.temp_dir.join(format!("{name}.part"))
    }

    async fn stream_to(
        &self,
        url: &str,
        temp_path: &Path,
    ) -> std::result::Result<u64, RetrievalError> {
        let download_error = |source: FetchError| RetrievalError::Download {
            url: url.to_string(),
            source,
        };
        let write_error = |source: std::io::Error| RetrievalError::Write {
            path: temp_path.to_path_buf(),
            source,
        };

        let mut response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| download_error(FetchError::from_reqwest(url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        // Quota and virus-scan interstitials come back as 200 text/html
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.starts_with("text/html") {
            return Err(RetrievalError::UnexpectedContent {
                url: url.to_string(),
                content_type,
            });
        }

        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(write_error)?;
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| {
            download_error(FetchError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })
        })? {
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;

        if written == 0 {
            return Err(RetrievalError::Empty {
                url: url.to_string(),
            });
        }
        Ok(written)
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .timeout(self.page_timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MediaRetriever for HttpClient {
    async fn retrieve(
        &self,
        url: &str,
        destination: &Path,
    ) -> std::result::Result<u64, RetrievalError> {
        let write_error = |path: &Path, source: std::io::Error| RetrievalError::Write {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| write_error(&self.temp_dir, e))?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(parent, e))?;
        }

        let temp_path = self.temp_path(destination);
        info!(url = %url, destination = %destination.display(), "Downloading episode");

        let written = match self.stream_to(url, &temp_path).await {
            Ok(written) => written,
            Err(e) => {
                discard_temp_file(&temp_path).await;
                return Err(e);
            }
        };

        if tokio::fs::rename(&temp_path, destination).await.is_err() {
            // Temp and download directories may live on different filesystems
            tokio::fs::copy(&temp_path, destination)
                .await
                .map_err(|e| write_error(destination, e))?;
            discard_temp_file(&temp_path).await;
        }

        info!(
            destination = %destination.display(),
            bytes = written,
            "Episode download complete"
        );
        Ok(written)
    }
}

/// Remove a temp download, logging anything but an already-missing file
async fn discard_temp_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove temp download");
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
