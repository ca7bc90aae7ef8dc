//! Error types for c2c-dl
//!
//! Errors are grouped by the granularity at which they are recovered:
//! - cycle level: [`FetchError`] and [`Error::StructureMismatch`] end the current cycle early
//! - episode level: [`ResolutionError`] and [`RetrievalError`] skip one episode
//! - process level: [`Error::Config`] and [`Error::Authentication`] are fatal
//!
//! See [`Error::is_fatal`] for the classification the scheduler relies on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for c2c-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for c2c-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "torrent_client.username")
        key: Option<String>,
    },

    /// A source page could not be fetched
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The expected markup container was missing from a fetched page
    #[error("page layout changed: expected container not found on {url}")]
    StructureMismatch {
        /// Page that was parsed
        url: String,
    },

    /// A candidate's reference could not be turned into a fetchable location
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// The media payload could not be retrieved
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The download client rejected our credentials
    #[error("authentication failed: {message}")]
    Authentication {
        /// Reason reported by the client
        message: String,
    },

    /// A publication sink failed for a reason other than authentication
    #[error("publication error: {0}")]
    Sink(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error must stop the process instead of being retried next cycle
    ///
    /// Only configuration and download-client authentication failures qualify;
    /// everything else is recovered at cycle or episode granularity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::Authentication { .. })
    }
}

/// Page fetch failures (network, transport, non-2xx)
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Connection or protocol failure before a response arrived
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying client error
        message: String,
    },

    /// The request did not complete within the configured timeout
    #[error("request to {url} timed out")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// The response body could not be read
    #[error("failed to read body from {url}: {message}")]
    Body {
        /// Requested URL
        url: String,
        /// Underlying client error
        message: String,
    },
}

impl FetchError {
    /// Build a fetch error from a reqwest error, keeping the timeout and status classification
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Reference-to-target resolution failures
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The viewer URL has no `/file/d/<id>/` segment
    #[error("no embedded file id in {reference}")]
    MissingFileId {
        /// Reference that was inspected
        reference: String,
    },

    /// The detail page contained no embedded viewer link
    #[error("no embedded viewer link found on {reference}")]
    NoEmbeddedLink {
        /// Detail page that was inspected
        reference: String,
    },

    /// The detail page itself could not be fetched
    #[error("could not load detail page {reference}: {source}")]
    DetailPage {
        /// Detail page URL
        reference: String,
        /// Fetch failure
        #[source]
        source: FetchError,
    },

    /// The reference uses a scheme we cannot hand to a retriever
    #[error("unsupported reference {reference}")]
    UnsupportedScheme {
        /// Reference that was inspected
        reference: String,
    },
}

/// Media payload retrieval failures
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// HTTP failure while downloading the payload
    #[error("download of {url} failed: {source}")]
    Download {
        /// Payload URL
        url: String,
        /// Fetch failure
        #[source]
        source: FetchError,
    },

    /// The payload could not be written to disk
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The server returned an HTML page instead of media (e.g. a quota interstitial)
    #[error("{url} returned {content_type} instead of a media payload")]
    UnexpectedContent {
        /// Payload URL
        url: String,
        /// Reported content type
        content_type: String,
    },

    /// The payload was empty
    #[error("{url} returned an empty payload")]
    Empty {
        /// Payload URL
        url: String,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}
