//! HTTP server for the podcast feed and the downloaded media
//!
//! Two routes:
//! - `GET /podcast_feed.xml` serves the generated feed file
//! - `GET /downloads/<file>` serves files from the download directory
//!
//! Enclosure URLs in the feed point at the second route, so `feed.base_url` should be
//! the address this server is reachable under.

use crate::config::Config;
use crate::error::Result;
use axum::Router;
use std::future::Future;
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Path the feed is published under
pub const FEED_ROUTE: &str = "/podcast_feed.xml";

/// Path prefix for media files
pub const DOWNLOADS_ROUTE: &str = "/downloads";

/// Build the router serving `feed_path` and `download_dir`
pub fn create_router(feed_path: &Path, download_dir: &Path) -> Router {
    Router::new()
        .route_service(FEED_ROUTE, ServeFile::new(feed_path))
        .nest_service(DOWNLOADS_ROUTE, ServeDir::new(download_dir))
        .layer(TraceLayer::new_for_http())
}

/// Serve the feed until `shutdown` completes
///
/// # Errors
/// Binding the configured address or the server itself failing
pub async fn start_feed_server<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.bind_address;
    tracing::info!(address = %bind_address, "Starting feed server");

    let app = create_router(&config.feed.output_path, &config.retrieval.download_dir);
    let listener = TcpListener::bind(bind_address).await?;

    tracing::info!(
        address = %bind_address,
        feed = %config.feed.output_path.display(),
        "Feed server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Feed server stopped");
    Ok(())
}
