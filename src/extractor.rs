//! Episode extraction from listing-page HTML
//!
//! A [`SourceProfile`] names the CSS selectors for one site layout. The
//! [`SelectorExtractor`] applies them to a page:
//!
//! 1. Locate the container element. If it is missing the page layout has changed; the
//!    result is empty and flagged with `structure_mismatch`.
//! 2. Take the first `download_amount` entry elements inside it, in document order.
//! 3. For each, read the title from the anchor's `title` attribute or its text, and the
//!    reference from the embedded viewer (when the profile has one) or the anchor's `href`.
//! 4. Drop entries whose title lacks the required prefix.
//!
//! The older-posts link is reported separately for pagination.

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Error, Result};
use crate::types::EpisodeRecord;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// CSS selectors describing one source layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceProfile {
    /// Element holding every entry on the page
    pub container: String,
    /// One element per episode, searched inside the container
    pub entry: String,
    /// Anchor carrying the title and detail-page link, searched inside an entry
    pub title: String,
    /// Embedded viewer element inside an entry whose `src` is the preferred reference
    pub embedded: Option<String>,
    /// Free-text body inside an entry, kept as the record's notes
    pub notes: Option<String>,
    /// Older-posts / next-page anchor, searched in the whole document
    pub next_page: String,
}

impl SourceProfile {
    /// Blogspot archive layout
    pub fn blogspot() -> Self {
        Self {
            container: "div.blog-posts".to_string(),
            entry: "div.post-outer".to_string(),
            title: "h3.post-title a".to_string(),
            embedded: Some("iframe[src]".to_string()),
            notes: Some("div.post-body".to_string()),
            next_page: "a.blog-pager-older-link".to_string(),
        }
    }

    /// Knaben torrent search layout
    pub fn knaben() -> Self {
        Self {
            container: "div.p-3".to_string(),
            entry: ".text-wrap.w-100".to_string(),
            title: "a".to_string(),
            embedded: None,
            notes: None,
            next_page: "a[rel=next]".to_string(),
        }
    }

    /// Preset for the configured source kind, with any selector overrides applied
    pub fn for_source(config: &SourceConfig) -> Self {
        let mut profile = match config.kind {
            SourceKind::Blogspot => Self::blogspot(),
            SourceKind::Knaben => Self::knaben(),
        };
        let overrides = &config.selectors;
        if let Some(container) = &overrides.container {
            profile.container = container.clone();
        }
        if let Some(entry) = &overrides.entry {
            profile.entry = entry.clone();
        }
        if let Some(title) = &overrides.title {
            profile.title = title.clone();
        }
        if let Some(next_page) = &overrides.next_page {
            profile.next_page = next_page.clone();
        }
        profile
    }
}

/// Result of extracting one page
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageExtraction {
    /// Relevant candidates, in document order, at most `download_amount` of them
    pub candidates: Vec<EpisodeRecord>,
    /// Absolute URL of the older-posts page, if the page links one
    pub next_page: Option<String>,
    /// The container element was absent
    pub structure_mismatch: bool,
}

/// Turns page content into candidate episode records
///
/// Implementations are pure functions of their input, so a page can be re-extracted
/// at any time with the same result.
pub trait EpisodeExtractor: Send + Sync {
    /// Extract candidates from `page`, resolving relative links against `page_url`
    fn extract(&self, page: &str, page_url: &str) -> PageExtraction;
}

/// [`EpisodeExtractor`] driven by a [`SourceProfile`]
#[derive(Debug)]
pub struct SelectorExtractor {
    container: Selector,
    entry: Selector,
    title: Selector,
    embedded: Option<Selector>,
    notes: Option<Selector>,
    next_page: Selector,
    title_prefix: String,
    download_amount: usize,
}

impl SelectorExtractor {
    /// Compile a profile's selectors
    ///
    /// # Errors
    /// Returns a configuration error naming the first selector that does not parse
    pub fn new(
        profile: &SourceProfile,
        title_prefix: impl Into<String>,
        download_amount: usize,
    ) -> Result<Self> {
        Ok(Self {
            container: parse_selector(&profile.container, "source.selectors.container")?,
            entry: parse_selector(&profile.entry, "source.selectors.entry")?,
            title: parse_selector(&profile.title, "source.selectors.title")?,
            embedded: profile
                .embedded
                .as_deref()
                .map(|s| parse_selector(s, "source.selectors.embedded"))
                .transpose()?,
            notes: profile
                .notes
                .as_deref()
                .map(|s| parse_selector(s, "source.selectors.notes"))
                .transpose()?,
            next_page: parse_selector(&profile.next_page, "source.selectors.next_page")?,
            title_prefix: title_prefix.into(),
            download_amount,
        })
    }

    /// Extractor for the configured source
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(
            &SourceProfile::for_source(config),
            config.title_prefix.clone(),
            config.download_amount,
        )
    }

    /// Lazily walk the capped entries of a container, yielding relevant records
    fn candidates<'a>(
        &'a self,
        container: ElementRef<'a>,
        base: Option<&'a Url>,
    ) -> impl Iterator<Item = EpisodeRecord> + 'a {
        container
            .select(&self.entry)
            .take(self.download_amount)
            .filter_map(move |entry| self.parse_entry(entry, base))
            .filter(move |record| {
                let relevant = record.title.starts_with(&self.title_prefix);
                if !relevant {
                    debug!(title = %record.title, prefix = %self.title_prefix, "Skipping unrelated entry");
                }
                relevant
            })
    }

    fn parse_entry(&self, entry: ElementRef<'_>, base: Option<&Url>) -> Option<EpisodeRecord> {
        let anchor = entry.select(&self.title).next()?;

        let title = anchor
            .value()
            .attr("title")
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| collapse_whitespace(&anchor.text().collect::<String>()));
        if title.is_empty() {
            return None;
        }

        let embedded = self.embedded.as_ref().and_then(|selector| {
            entry
                .select(selector)
                .filter_map(|e| e.value().attr("src"))
                .find(|src| !src.trim().is_empty())
        });
        let reference = embedded.or_else(|| anchor.value().attr("href"))?;
        let reference = absolutize(reference.trim(), base);

        let mut record = EpisodeRecord::new(title, reference);
        record.notes = self.notes.as_ref().and_then(|selector| {
            entry
                .select(selector)
                .next()
                .map(|body| body.text().collect::<Vec<_>>().join("\n").trim().to_string())
                .filter(|text| !text.is_empty())
        });
        Some(record)
    }
}

impl EpisodeExtractor for SelectorExtractor {
    fn extract(&self, page: &str, page_url: &str) -> PageExtraction {
        let document = Html::parse_document(page);
        let base = Url::parse(page_url).ok();

        let Some(container) = document.select(&self.container).next() else {
            warn!(url = %page_url, "Expected container not found, page layout may have changed");
            return PageExtraction {
                structure_mismatch: true,
                ..PageExtraction::default()
            };
        };

        let candidates: Vec<EpisodeRecord> = self.candidates(container, base.as_ref()).collect();

        let next_page = document
            .select(&self.next_page)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| absolutize(href.trim(), base.as_ref()))
            .find(|href| !href.is_empty());

        debug!(
            url = %page_url,
            candidates = candidates.len(),
            has_next_page = next_page.is_some(),
            "Extracted page"
        );

        PageExtraction {
            candidates,
            next_page,
            structure_mismatch: false,
        }
    }
}

fn parse_selector(selector: &str, key: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::config(format!("invalid CSS selector {selector:?}: {e}"), key))
}

/// Resolve `href` against the page URL; magnet links and unparseable bases pass through
fn absolutize(href: &str, base: Option<&Url>) -> String {
    if href.starts_with("magnet:") {
        return href.to_string();
    }
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
