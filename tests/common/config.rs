//! Test configuration pointing every path into a temp dir and every URL at a mock server

use c2c_dl::Config;
use c2c_dl::config::{LedgerBackend, RetrievalMode, RetryConfig, SourceKind};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Config plus the temp dir that owns its paths
pub struct TestEnv {
    /// Keeps the directory alive for the test's duration
    pub dir: TempDir,
    /// Ready-to-use configuration
    pub config: Config,
}

impl TestEnv {
    /// Download directory
    pub fn download_dir(&self) -> PathBuf {
        self.config.retrieval.download_dir.clone()
    }

    /// Feed output file
    pub fn feed_path(&self) -> PathBuf {
        self.config.feed.output_path.clone()
    }
}

/// Blog source in download mode with a sqlite ledger
///
/// Pacing and retries are disabled so cycles finish quickly.
pub fn blog_env(source: &MockServer) -> TestEnv {
    let dir = TempDir::new().expect("temp dir");
    let mut config = Config::default();

    config.source.url = format!("{}/", source.uri());
    config.source.kind = SourceKind::Blogspot;
    config.source.max_pages = 3;

    config.retrieval.mode = RetrievalMode::Download;
    config.retrieval.download_dir = dir.path().join("downloads");
    config.retrieval.temp_dir = dir.path().join("temp");
    config.retrieval.page_timeout = Duration::from_secs(5);
    config.retrieval.download_timeout = Duration::from_secs(10);

    config.pacing.min_delay = Duration::ZERO;
    config.pacing.max_delay = Duration::ZERO;
    config.retry = RetryConfig {
        max_attempts: 0,
        ..RetryConfig::default()
    };

    config.ledger.backend = LedgerBackend::Sqlite;
    config.ledger.database_path = dir.path().join("c2c-dl.db");

    config.feed.output_path = dir.path().join("podcast_feed.xml");
    config.feed.base_url = "http://localhost:8000".to_string();

    TestEnv { dir, config }
}

/// Torrent index source handing magnet links to the mock qBittorrent
pub fn delegate_env(source: &MockServer, qbittorrent: &MockServer) -> TestEnv {
    let mut env = blog_env(source);
    let address = qbittorrent.address();

    env.config.source.url = format!("{}/search/coast%20to%20coast%20am/0/1/date", source.uri());
    env.config.source.kind = SourceKind::Knaben;
    env.config.source.max_pages = 1;

    env.config.retrieval.mode = RetrievalMode::Delegate;
    env.config.ledger.backend = LedgerBackend::Filesystem;
    env.config.feed.enabled = false;

    env.config.torrent_client.host = address.ip().to_string();
    env.config.torrent_client.port = address.port();
    env.config.torrent_client.username = Some("admin".to_string());
    env.config.torrent_client.password = Some("adminadmin".to_string());
    env.config.torrent_client.download_path = Some("/downloads/c2c".to_string());

    env
}
