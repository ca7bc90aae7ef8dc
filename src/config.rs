//! Configuration types for c2c-dl
//!
//! Every field has a default so an empty JSON object (or no file at all) yields a
//! working configuration for the blog source. Credentials for the download client
//! are never read from the file; they come from the environment (see
//! [`TorrentClientConfig::apply_env`]).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Which listing layout the source uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Blogspot-style archive: posts with an embedded file viewer
    #[default]
    Blogspot,
    /// Torrent search index: rows linking to magnet/torrent URLs
    Knaben,
}

/// Where episodes are discovered
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Listing page polled at the start of every cycle
    #[serde(default = "default_source_url")]
    pub url: String,

    /// Listing layout (default: blogspot)
    #[serde(default)]
    pub kind: SourceKind,

    /// Titles must start with this literal prefix (case-sensitive, default: "Coast")
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,

    /// Maximum entries taken from each page, in document order (default: 5)
    #[serde(default = "default_download_amount")]
    pub download_amount: usize,

    /// Lookback limit: pages visited per cycle, including the first (default: 3)
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// User-agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch a post's detail page when its listing entry has no embedded viewer link
    #[serde(default = "default_true")]
    pub follow_detail_pages: bool,

    /// Selector overrides applied on top of the preset for `kind`
    #[serde(default)]
    pub selectors: SelectorOverrides,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            kind: SourceKind::default(),
            title_prefix: default_title_prefix(),
            download_amount: default_download_amount(),
            max_pages: default_max_pages(),
            user_agent: default_user_agent(),
            follow_detail_pages: true,
            selectors: SelectorOverrides::default(),
        }
    }
}

/// Optional CSS selector overrides for a source preset
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectorOverrides {
    /// Container element holding all entries
    #[serde(default)]
    pub container: Option<String>,
    /// One element per episode entry, searched inside the container
    #[serde(default)]
    pub entry: Option<String>,
    /// Anchor carrying the title, searched inside an entry
    #[serde(default)]
    pub title: Option<String>,
    /// Older-posts / next-page link, searched in the whole document
    #[serde(default)]
    pub next_page: Option<String>,
}

/// How a resolved episode is obtained
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Download the payload into `download_dir`
    #[default]
    Download,
    /// Hand the resolved links to the download client sink
    Delegate,
}

/// Retrieval behavior (directories, timeouts, side files)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Download locally or delegate to the torrent client (default: download)
    #[serde(default)]
    pub mode: RetrievalMode,

    /// Download directory (default: "downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory for in-progress payloads (default: "temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Extension given to downloaded media (default: "mp4")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Write a descriptive `.txt` next to each downloaded episode (default: true)
    #[serde(default = "default_true")]
    pub write_description: bool,

    /// Timeout for listing/detail page requests (default: 30 seconds)
    #[serde(default = "default_page_timeout", with = "duration_serde")]
    pub page_timeout: Duration,

    /// Timeout for a whole media download (default: 2 hours)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// Timeout for establishing a connection (default: 15 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            download_dir: default_download_dir(),
            temp_dir: default_temp_dir(),
            file_extension: default_file_extension(),
            write_description: true,
            page_timeout: default_page_timeout(),
            download_timeout: default_download_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Randomized wait between successive retrievals within a cycle
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Lower bound (default: 3 seconds)
    #[serde(default = "default_pacing_min", with = "duration_serde")]
    pub min_delay: Duration,

    /// Upper bound (default: 7 seconds)
    #[serde(default = "default_pacing_max", with = "duration_serde")]
    pub max_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay: default_pacing_min(),
            max_delay: default_pacing_max(),
        }
    }
}

/// Cycle re-arm settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Wait between the end of one cycle and the start of the next (default: 12 hours)
    #[serde(default = "default_schedule_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Run a cycle immediately at startup instead of waiting one interval (default: true)
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_schedule_interval(),
            run_on_start: true,
        }
    }
}

/// Retry configuration for transient page-fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Ledger storage backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// Explicit index in SQLite
    #[default]
    Sqlite,
    /// Existence of the would-be output file
    Filesystem,
}

/// Deduplication ledger settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Backend (default: sqlite)
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Database path (default: "c2c-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            database_path: default_database_path(),
        }
    }
}

/// Podcast feed settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Write the feed after every cycle (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Output path (default: "podcast_feed.xml")
    #[serde(default = "default_feed_path")]
    pub output_path: PathBuf,

    /// Channel title
    #[serde(default = "default_feed_title")]
    pub title: String,

    /// Channel description
    #[serde(default = "default_feed_description")]
    pub description: String,

    /// Public base URL the download directory is served under
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Channel language (default: "en")
    #[serde(default = "default_language")]
    pub language: String,

    /// iTunes category (default: "News")
    #[serde(default = "default_itunes_category")]
    pub itunes_category: String,

    /// iTunes subcategory (default: "News Commentary")
    #[serde(default = "default_itunes_subcategory")]
    pub itunes_subcategory: Option<String>,

    /// iTunes explicit flag (default: false)
    #[serde(default)]
    pub explicit: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_path: default_feed_path(),
            title: default_feed_title(),
            description: default_feed_description(),
            base_url: default_base_url(),
            language: default_language(),
            itunes_category: default_itunes_category(),
            itunes_subcategory: default_itunes_subcategory(),
            explicit: false,
        }
    }
}

/// qBittorrent Web API connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TorrentClientConfig {
    /// Host (default: "localhost")
    #[serde(default = "default_client_host")]
    pub host: String,

    /// Port (default: 8080)
    #[serde(default = "default_client_port")]
    pub port: u16,

    /// Login user (environment only)
    #[serde(skip)]
    pub username: Option<String>,

    /// Login password (environment only)
    #[serde(skip)]
    pub password: Option<String>,

    /// Save path passed with every submitted link
    #[serde(default)]
    pub download_path: Option<String>,
}

impl Default for TorrentClientConfig {
    fn default() -> Self {
        Self {
            host: default_client_host(),
            port: default_client_port(),
            username: None,
            password: None,
            download_path: None,
        }
    }
}

impl TorrentClientConfig {
    /// Overlay settings from the process environment
    ///
    /// Reads `USERNAME`, `PASSWORD`, `HOST`, `PORT` and `DOWNLOAD_PATH`, falling back
    /// to the `QB_`-prefixed names. Unset variables leave the current value alone.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_var("USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = env_var("PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = env_var("HOST") {
            self.host = v;
        }
        if let Some(v) = env_var("PORT") {
            self.port = v
                .parse()
                .map_err(|_| Error::config(format!("PORT is not a valid port: {v}"), "PORT"))?;
        }
        if let Some(v) = env_var("DOWNLOAD_PATH") {
            self.download_path = Some(v);
        }
        Ok(())
    }

    /// Base URL of the Web API
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Optional HTTP server exposing the feed and the download directory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Start the server alongside the scheduler (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Bind address (default: 0.0.0.0:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing source
    #[serde(default)]
    pub source: SourceConfig,

    /// Retrieval behavior
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Inter-retrieval pacing
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Cycle scheduling
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Page fetch retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Deduplication ledger
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Podcast feed output
    #[serde(default)]
    pub feed: FeedConfig,

    /// Download client (delegate mode)
    #[serde(default)]
    pub torrent_client: TorrentClientConfig,

    /// Feed server
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from an optional JSON file plus the environment
    ///
    /// A `.env` file in the working directory is honored. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "Failed to read .env file");
        }

        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(
                        format!("cannot read config file {}: {}", path.display(), e),
                        "config",
                    )
                })?;
                serde_json::from_str::<Config>(&raw)?
            }
            None => Config::default(),
        };

        config.torrent_client.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.source.download_amount == 0 {
            return Err(Error::config(
                "download_amount must be at least 1",
                "source.download_amount",
            ));
        }
        if self.source.max_pages == 0 {
            return Err(Error::config(
                "max_pages must be at least 1",
                "source.max_pages",
            ));
        }
        if self.pacing.min_delay > self.pacing.max_delay {
            return Err(Error::config(
                "pacing min_delay must not exceed max_delay",
                "pacing.min_delay",
            ));
        }
        url::Url::parse(&self.source.url)
            .map_err(|e| Error::config(format!("invalid source url: {e}"), "source.url"))?;

        if self.retrieval.mode == RetrievalMode::Delegate {
            let missing = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
            if missing(&self.torrent_client.username) || missing(&self.torrent_client.password) {
                return Err(Error::config(
                    "USERNAME and PASSWORD must be set for the download client",
                    "torrent_client.username",
                ));
            }
        }
        Ok(())
    }
}

/// Read an environment variable, falling back to its `QB_`-prefixed form
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .or_else(|| std::env::var(format!("QB_{name}")).ok())
        .filter(|v| !v.is_empty())
}

// Default value functions
fn default_source_url() -> String {
    "https://zfirelight.blogspot.com/".to_string()
}

fn default_title_prefix() -> String {
    "Coast".to_string()
}

fn default_download_amount() -> usize {
    5
}

fn default_max_pages() -> usize {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_file_extension() -> String {
    "mp4".to_string()
}

fn default_page_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_pacing_min() -> Duration {
    Duration::from_secs(3)
}

fn default_pacing_max() -> Duration {
    Duration::from_secs(7)
}

fn default_schedule_interval() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_database_path() -> PathBuf {
    PathBuf::from("c2c-dl.db")
}

fn default_feed_path() -> PathBuf {
    PathBuf::from("podcast_feed.xml")
}

fn default_feed_title() -> String {
    "Coast to Coast AM Episodes".to_string()
}

fn default_feed_description() -> String {
    "Latest Coast to Coast AM Episodes".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_itunes_category() -> String {
    "News".to_string()
}

fn default_itunes_subcategory() -> Option<String> {
    Some("News Commentary".to_string())
}

fn default_client_host() -> String {
    "localhost".to_string()
}

fn default_client_port() -> u16 {
    8080
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
