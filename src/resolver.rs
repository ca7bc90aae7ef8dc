//! Turning a candidate's source reference into a fetchable retrieval target

use crate::error::ResolutionError;
use crate::fetcher::PageFetcher;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::debug;
use url::Url;

static FILE_ID: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"/file/d/([^/?#]+)").expect("static regex")
});

static IFRAME_SRC: LazyLock<Selector> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Selector::parse("iframe[src]").expect("static selector")
});

/// Resolves a source reference to a retrieval target
///
/// Failures are per-episode: the orchestrator logs them and moves on, and the episode
/// stays eligible for the next cycle.
#[async_trait]
pub trait RetrievalResolver: Send + Sync {
    /// Resolve `source_reference` to a direct-download, magnet or torrent URL
    async fn resolve(&self, source_reference: &str) -> Result<String, ResolutionError>;

    /// Whether resolving `source_reference` requests a page from the source
    fn fetches_source(&self, _source_reference: &str) -> bool {
        false
    }
}

/// Build the direct-download URL for an embedded-file viewer URL
///
/// Takes the identifier from the `/file/d/<id>/` path segment and keeps the viewer's
/// scheme and host.
///
/// # Examples
///
/// ```
/// use c2c_dl::resolver::direct_download_url;
///
/// assert_eq!(
///     direct_download_url("https://host/file/d/ABC123/view").unwrap(),
///     "https://host/uc?export=download&id=ABC123"
/// );
/// assert!(direct_download_url("https://host/open?id=ABC123").is_err());
/// ```
pub fn direct_download_url(reference: &str) -> Result<String, ResolutionError> {
    let missing = || ResolutionError::MissingFileId {
        reference: reference.to_string(),
    };

    let mut url = Url::parse(reference.trim()).map_err(|_| missing())?;
    let id = FILE_ID
        .captures(url.path())
        .map(|caps| caps[1].to_string())
        .ok_or_else(missing)?;

    url.set_path("/uc");
    url.set_query(Some(&format!("export=download&id={id}")));
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Resolver for blog posts that embed a file viewer
///
/// Viewer URLs are transformed directly. Any other http(s) reference is treated as a
/// post page: when a fetcher is configured, the page is loaded and its first embedded
/// viewer is used.
#[derive(Clone, Default)]
pub struct EmbeddedFileResolver {
    detail_fetcher: Option<Arc<dyn PageFetcher>>,
}

impl EmbeddedFileResolver {
    /// Resolver that only accepts viewer URLs
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that follows post pages through `fetcher`
    pub fn with_detail_pages(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            detail_fetcher: Some(fetcher),
        }
    }
}

#[async_trait]
impl RetrievalResolver for EmbeddedFileResolver {
    async fn resolve(&self, source_reference: &str) -> Result<String, ResolutionError> {
        if FILE_ID.is_match(source_reference) {
            return direct_download_url(source_reference);
        }

        let Some(fetcher) = &self.detail_fetcher else {
            return Err(ResolutionError::MissingFileId {
                reference: source_reference.to_string(),
            });
        };
        if !is_http(source_reference) {
            return Err(ResolutionError::UnsupportedScheme {
                reference: source_reference.to_string(),
            });
        }

        debug!(reference = %source_reference, "Looking for embedded viewer on post page");
        let page = fetcher
            .fetch(source_reference)
            .await
            .map_err(|source| ResolutionError::DetailPage {
                reference: source_reference.to_string(),
                source,
            })?;

        let viewer = find_embedded_viewer(&page, source_reference).ok_or_else(|| {
            ResolutionError::NoEmbeddedLink {
                reference: source_reference.to_string(),
            }
        })?;
        direct_download_url(&viewer)
    }

    fn fetches_source(&self, source_reference: &str) -> bool {
        self.detail_fetcher.is_some()
            && !FILE_ID.is_match(source_reference)
            && is_http(source_reference)
    }
}

/// First `iframe[src]` on the page that points at a file viewer, made absolute
fn find_embedded_viewer(page: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(page);
    let base = Url::parse(page_url).ok();
    document
        .select(&IFRAME_SRC)
        .filter_map(|iframe| iframe.value().attr("src"))
        .find(|src| FILE_ID.is_match(src))
        .map(|src| match base.as_ref().and_then(|b| b.join(src.trim()).ok()) {
            Some(url) => url.to_string(),
            None => src.trim().to_string(),
        })
}

fn is_http(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Resolver for torrent-index rows: magnet and http(s) links pass through unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectLinkResolver;

#[async_trait]
impl RetrievalResolver for DirectLinkResolver {
    async fn resolve(&self, source_reference: &str) -> Result<String, ResolutionError> {
        let reference = source_reference.trim();
        if reference.starts_with("magnet:") || is_http(reference) {
            Ok(reference.to_string())
        } else {
            Err(ResolutionError::UnsupportedScheme {
                reference: source_reference.to_string(),
            })
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetrievalConfig, SourceConfig};
    use crate::fetcher::HttpClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_fetcher() -> Arc<dyn PageFetcher> {
        Arc::new(HttpClient::new(&SourceConfig::default(), &RetrievalConfig::default()).unwrap())
    }

    #[test]
    fn viewer_url_becomes_direct_download() {
        assert_eq!(
            direct_download_url("https://drive.google.com/file/d/1aB-_9xYz/preview?usp=sharing")
                .unwrap(),
            "https://drive.google.com/uc?export=download&id=1aB-_9xYz"
        );
        assert_eq!(
            direct_download_url("http://localhost:9000/file/d/XYZ").unwrap(),
            "http://localhost:9000/uc?export=download&id=XYZ"
        );
    }

    #[test]
    fn references_without_file_segment_fail() {
        for reference in [
            "https://host/open?id=ABC123",
            "https://host/file/d/",
            "not a url",
        ] {
            assert!(
                matches!(
                    direct_download_url(reference),
                    Err(ResolutionError::MissingFileId { .. })
                ),
                "{reference} should not resolve"
            );
        }
    }

    #[tokio::test]
    async fn embedded_resolver_without_fetcher_rejects_post_links() {
        let resolver = EmbeddedFileResolver::new();
        let err = resolver
            .resolve("https://zfirelight.blogspot.com/2024/01/post.html")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MissingFileId { .. }));
    }

    #[tokio::test]
    async fn post_page_iframe_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/01/post.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body>
                   <iframe src="https://www.youtube.com/embed/zzz"></iframe>
                   <iframe src="https://drive.google.com/file/d/POST42/preview"></iframe>
                   </body></html>"#,
            ))
            .mount(&server)
            .await;

        let resolver = EmbeddedFileResolver::with_detail_pages(http_fetcher());
        let target = resolver
            .resolve(&format!("{}/2024/01/post.html", server.uri()))
            .await
            .unwrap();

        assert_eq!(target, "https://drive.google.com/uc?export=download&id=POST42");
    }

    #[tokio::test]
    async fn post_page_without_viewer_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>text only</p>"))
            .mount(&server)
            .await;

        let resolver = EmbeddedFileResolver::with_detail_pages(http_fetcher());
        let err = resolver.resolve(&server.uri()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoEmbeddedLink { .. }));
    }

    #[tokio::test]
    async fn unreachable_post_page_is_a_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resolver = EmbeddedFileResolver::with_detail_pages(http_fetcher());
        let err = resolver.resolve(&server.uri()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::DetailPage { .. }));
    }

    #[test]
    fn only_post_page_lookups_fetch_from_source() {
        let post = "https://zfirelight.blogspot.com/2024/01/post.html";
        let viewer = "https://drive.google.com/file/d/POST42/preview";

        assert!(EmbeddedFileResolver::with_detail_pages(http_fetcher()).fetches_source(post));
        assert!(!EmbeddedFileResolver::with_detail_pages(http_fetcher()).fetches_source(viewer));
        assert!(!EmbeddedFileResolver::new().fetches_source(post));
        assert!(!DirectLinkResolver.fetches_source(post));
    }

    #[tokio::test]
    async fn direct_links_pass_through() {
        let resolver = DirectLinkResolver;
        assert_eq!(
            resolver.resolve("magnet:?xt=urn:btih:AAA").await.unwrap(),
            "magnet:?xt=urn:btih:AAA"
        );
        assert_eq!(
            resolver.resolve(" https://knaben.org/t/1.torrent ").await.unwrap(),
            "https://knaben.org/t/1.torrent"
        );
        assert!(matches!(
            resolver.resolve("ftp://host/file").await,
            Err(ResolutionError::UnsupportedScheme { .. })
        ));
    }
}
