//! The polling cycle: fetch, extract, deduplicate, resolve, retrieve, paginate, publish
//!
//! One cycle walks the listing pages starting at the source URL. For each candidate the
//! ledger is consulted first; only unknown episodes are resolved and retrieved, one at
//! a time with a randomized pause between requests to the source. Per-episode failures are logged
//! and skipped. A fetch failure on the first page abandons the cycle; on a later page
//! it only stops pagination.
//!
//! Cycles never overlap: [`FetchOrchestrator::run_cycle`] holds a run lock for its
//! whole duration.

mod state;

pub use state::{Advance, CycleReport, Halted, OrchestratorState, PaginationCursor};

use crate::config::{Config, LedgerBackend, RetrievalMode, RetryConfig, SourceKind};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extractor::{EpisodeExtractor, SelectorExtractor};
use crate::fetcher::{HttpClient, MediaRetriever, PageFetcher};
use crate::ledger::{DeduplicationLedger, FilesystemLedger, SqliteLedger};
use crate::metadata;
use crate::pacing::Pacer;
use crate::resolver::{DirectLinkResolver, EmbeddedFileResolver, RetrievalResolver};
use crate::retry::with_retry;
use crate::sink::{FeedSink, PublicationSink, QbittorrentSink};
use crate::types::{DeduplicationKey, EpisodeRecord, Event, LedgerEntry};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};

/// How new episodes are obtained
#[derive(Clone)]
pub enum RetrievalStrategy {
    /// Download each payload into `download_dir`
    Download {
        /// Payload downloader
        retriever: Arc<dyn MediaRetriever>,
        /// Destination directory
        download_dir: PathBuf,
        /// Extension given to media files
        extension: String,
        /// Write a descriptive `.txt` next to each file
        write_description: bool,
    },
    /// Hand the resolved links to a download client at the end of the cycle
    Delegate {
        /// Download client adapter
        client: Arc<dyn PublicationSink>,
    },
}

/// Drives polling cycles over one source
pub struct FetchOrchestrator {
    source_url: String,
    max_pages: usize,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn EpisodeExtractor>,
    resolver: Arc<dyn RetrievalResolver>,
    ledger: Arc<dyn DeduplicationLedger>,
    strategy: RetrievalStrategy,
    sinks: Vec<Arc<dyn PublicationSink>>,
    pacer: Pacer,
    retry: RetryConfig,
    history: Option<Arc<Database>>,
    event_tx: broadcast::Sender<Event>,
    run_lock: Mutex<()>,
}

impl FetchOrchestrator {
    /// Assemble an orchestrator from its collaborators
    ///
    /// Defaults: one page per cycle, no pacing, default retry policy, no extra sinks
    /// and no cycle history.
    pub fn new(
        source_url: impl Into<String>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn EpisodeExtractor>,
        resolver: Arc<dyn RetrievalResolver>,
        ledger: Arc<dyn DeduplicationLedger>,
        strategy: RetrievalStrategy,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            source_url: source_url.into(),
            max_pages: 1,
            fetcher,
            extractor,
            resolver,
            ledger,
            strategy,
            sinks: Vec::new(),
            pacer: Pacer::disabled(),
            retry: RetryConfig::default(),
            history: None,
            event_tx,
            run_lock: Mutex::new(()),
        }
    }

    /// Lookback limit: pages visited per cycle, including the first
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Pacing between retrievals and page turns
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Retry policy for page fetches
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Add a sink that receives every cycle's new episodes
    pub fn with_sink(mut self, sink: Arc<dyn PublicationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Persist cycle history in `db`
    pub fn with_history(mut self, db: Arc<Database>) -> Self {
        self.history = Some(db);
        self
    }

    /// Wire up the orchestrator described by `config`
    ///
    /// Opens the database when the sqlite ledger is selected and creates the download
    /// client adapter in delegate mode.
    ///
    /// # Errors
    /// Configuration errors (bad selectors, missing credentials) and database errors
    pub async fn from_config(config: &Config) -> Result<Self> {
        let http = Arc::new(HttpClient::new(&config.source, &config.retrieval)?);
        let extractor = Arc::new(SelectorExtractor::from_config(&config.source)?);
        let download_dir = config.retrieval.download_dir.clone();
        let extension = config.retrieval.file_extension.clone();

        let resolver: Arc<dyn RetrievalResolver> = match config.source.kind {
            SourceKind::Blogspot if config.source.follow_detail_pages => {
                Arc::new(EmbeddedFileResolver::with_detail_pages(http.clone()))
            }
            SourceKind::Blogspot => Arc::new(EmbeddedFileResolver::new()),
            SourceKind::Knaben => Arc::new(DirectLinkResolver),
        };

        let db = match config.ledger.backend {
            LedgerBackend::Sqlite => {
                Some(Arc::new(Database::new(&config.ledger.database_path).await?))
            }
            LedgerBackend::Filesystem => None,
        };
        let ledger: Arc<dyn DeduplicationLedger> = match &db {
            Some(db) => Arc::new(SqliteLedger::new(db.clone())),
            None => Arc::new(FilesystemLedger::new(&download_dir, &extension)),
        };

        let strategy = match config.retrieval.mode {
            RetrievalMode::Download => RetrievalStrategy::Download {
                retriever: http.clone(),
                download_dir: download_dir.clone(),
                extension: extension.clone(),
                write_description: config.retrieval.write_description,
            },
            RetrievalMode::Delegate => RetrievalStrategy::Delegate {
                client: Arc::new(QbittorrentSink::new(&config.torrent_client)?),
            },
        };

        let mut orchestrator = Self::new(
            config.source.url.clone(),
            http,
            extractor,
            resolver,
            ledger,
            strategy,
        )
        .with_max_pages(config.source.max_pages)
        .with_pacer(Pacer::from(&config.pacing))
        .with_retry(config.retry.clone());

        if let Some(db) = db {
            orchestrator = orchestrator.with_history(db);
        }
        if config.feed.enabled {
            orchestrator = orchestrator.with_sink(Arc::new(FeedSink::new(
                config.feed.clone(),
                download_dir,
                &extension,
            )));
        }

        info!(
            source = %config.source.url,
            kind = ?config.source.kind,
            mode = ?config.retrieval.mode,
            ledger = ?config.ledger.backend,
            "Orchestrator configured"
        );
        Ok(orchestrator)
    }

    /// First page of every cycle
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Subscribe to cycle and episode events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: Event) {
        // No receivers is fine
        self.event_tx.send(event).ok();
    }

    /// Run one full cycle and return the next state
    ///
    /// Recoverable failures are recorded in the cycle report. Only fatal errors
    /// (see [`Error::is_fatal`]) are returned, wrapped with the advanced state.
    pub async fn run_cycle(
        &self,
        state: OrchestratorState,
    ) -> std::result::Result<OrchestratorState, Halted> {
        let _guard = self.run_lock.lock().await;

        let cycle = state.cycles_run + 1;
        let mut report = CycleReport::new(cycle);
        info!(cycle, url = %self.source_url, "Starting cycle");
        self.emit(Event::CycleStarted {
            cycle,
            url: self.source_url.clone(),
        });

        let history_id = match &self.history {
            Some(db) => match db.start_cycle().await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Failed to record cycle start");
                    None
                }
            },
            None => None,
        };

        let outcome = match self.walk(&mut report).await {
            Ok(()) => self.publish(&mut report).await,
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!(cycle, error = %e, "Cycle abandoned");
                report.error = Some(e.to_string());
                self.publish(&mut report).await
            }
        };

        let fatal = outcome.err();
        if let Some(e) = &fatal {
            report.error = Some(e.to_string());
        }

        if let (Some(db), Some(id)) = (&self.history, history_id)
            && let Err(e) = db
                .finish_cycle(
                    id,
                    report.retrieved.len(),
                    report.pages_fetched,
                    report.error.as_deref(),
                )
                .await
        {
            warn!(error = %e, "Failed to record cycle outcome");
        }

        info!(
            cycle,
            pages = report.pages_fetched,
            candidates = report.candidates,
            skipped = report.skipped,
            failed = report.failed,
            retrieved = report.retrieved.len(),
            "Cycle finished"
        );
        self.emit(Event::CycleFinished {
            cycle,
            retrieved: report.retrieved.len(),
            error: report.error.clone(),
        });

        let state = state.advance(report);
        match fatal {
            Some(error) => Err(Halted { state, error }),
            None => Ok(state),
        }
    }

    /// Walk the listing pages, handling every candidate
    async fn walk(&self, report: &mut CycleReport) -> Result<()> {
        let mut cursor = PaginationCursor::new(self.source_url.clone(), self.max_pages);
        let mut seen_this_cycle: HashSet<DeduplicationKey> = HashSet::new();
        let mut requests = 0usize;

        loop {
            let url = cursor.current_url().to_string();
            let page = match with_retry(&self.retry, || self.fetcher.fetch(&url)).await {
                Ok(page) => page,
                Err(e) if report.pages_fetched == 0 => return Err(e.into()),
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch older page, stopping pagination");
                    break;
                }
            };
            report.pages_fetched += 1;

            let extraction = self.extractor.extract(&page, &url);
            if extraction.structure_mismatch {
                let mismatch = Error::StructureMismatch { url: url.clone() };
                warn!(error = %mismatch, "Treating page as zero candidates");
                report.structure_mismatch = true;
                break;
            }
            report.candidates += extraction.candidates.len();

            for candidate in extraction.candidates {
                if !seen_this_cycle.insert(candidate.key()) {
                    debug!(title = %candidate.title, "Candidate already handled this cycle");
                    continue;
                }
                self.handle_candidate(candidate, &mut requests, report)
                    .await;
            }

            let Some(next) = extraction.next_page else {
                debug!(url = %url, "No older page link");
                break;
            };
            match cursor.advance(&next) {
                Advance::Moved => {
                    self.pacer.pause().await;
                }
                Advance::BudgetExhausted => {
                    debug!(pages = cursor.visited_count(), "Lookback page limit reached");
                    break;
                }
                Advance::AlreadyVisited => {
                    warn!(url = %next, "Older page link points back to a visited page, stopping");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Dedup check, resolution and retrieval for one candidate; never fails the cycle
    async fn handle_candidate(
        &self,
        mut candidate: EpisodeRecord,
        requests: &mut usize,
        report: &mut CycleReport,
    ) {
        match self.ledger.contains(&candidate).await {
            Ok(true) => {
                debug!(title = %candidate.title, "Episode already retrieved");
                report.skipped += 1;
                self.emit(Event::EpisodeSkipped {
                    title: candidate.title,
                });
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(title = %candidate.title, error = %e, "Ledger lookup failed, skipping episode");
                self.fail(candidate, &e, report);
                return;
            }
        }

        if self.resolver.fetches_source(&candidate.source_reference) {
            self.pace(requests).await;
        }
        let target = match self.resolver.resolve(&candidate.source_reference).await {
            Ok(target) => target,
            Err(e) => {
                let e = Error::from(e);
                warn!(
                    title = %candidate.title,
                    reference = %candidate.source_reference,
                    error = %e,
                    "Could not resolve episode, will retry next cycle"
                );
                self.fail(candidate, &e, report);
                return;
            }
        };
        candidate.retrieval_target = Some(target.clone());

        match &self.strategy {
            RetrievalStrategy::Download {
                retriever,
                download_dir,
                extension,
                write_description,
            } => {
                self.pace(requests).await;

                let destination = download_dir.join(candidate.file_name(extension));
                if let Err(e) = retriever.retrieve(&target, &destination).await {
                    let e = Error::from(e);
                    error!(title = %candidate.title, error = %e, "Episode retrieval failed");
                    self.fail(candidate, &e, report);
                    return;
                }

                if *write_description {
                    let path = metadata::description_path(&destination);
                    if let Err(e) = tokio::fs::write(&path, metadata::describe(&candidate)).await {
                        warn!(path = %path.display(), error = %e, "Failed to write episode description");
                    }
                }

                let entry = LedgerEntry::for_record(&candidate, &target);
                if let Err(e) = self.ledger.record(&candidate, &entry).await {
                    error!(title = %candidate.title, error = %e, "Failed to record episode in ledger");
                }

                info!(title = %candidate.title, path = %destination.display(), "Episode retrieved");
                self.emit(Event::EpisodeRetrieved {
                    title: candidate.title.clone(),
                    target,
                    path: Some(destination),
                });
                report.retrieved.push(candidate);
            }
            RetrievalStrategy::Delegate { .. } => {
                info!(title = %candidate.title, target = %target, "Episode queued for download client");
                report.retrieved.push(candidate);
            }
        }
    }

    fn fail(&self, candidate: EpisodeRecord, error: &Error, report: &mut CycleReport) {
        report.failed += 1;
        self.emit(Event::EpisodeFailed {
            title: candidate.title,
            error: error.to_string(),
        });
    }

    /// Pause before every per-episode source request except the cycle's first
    async fn pace(&self, requests: &mut usize) {
        if *requests > 0 {
            self.pacer.pause().await;
        }
        *requests += 1;
    }

    /// Hand the cycle's new episodes to the download client and the sinks
    async fn publish(&self, report: &mut CycleReport) -> Result<()> {
        if let RetrievalStrategy::Delegate { client } = &self.strategy
            && !report.retrieved.is_empty()
        {
            match client.publish(&report.retrieved).await {
                Ok(()) => {
                    for episode in &report.retrieved {
                        let target = episode.retrieval_target.as_deref().unwrap_or_default();
                        let entry = LedgerEntry::for_record(episode, target);
                        if let Err(e) = self.ledger.record(episode, &entry).await {
                            error!(title = %episode.title, error = %e, "Failed to record episode in ledger");
                        }
                        self.emit(Event::EpisodeRetrieved {
                            title: episode.title.clone(),
                            target: target.to_string(),
                            path: None,
                        });
                    }
                }
                Err(e) => {
                    error!(sink = client.name(), error = %e, "Download client rejected the batch");
                    let rejected = std::mem::take(&mut report.retrieved);
                    for episode in rejected {
                        self.fail(episode, &e, report);
                    }
                    if e.is_fatal() {
                        return Err(e);
                    }
                    report.error = Some(e.to_string());
                }
            }
        }

        for sink in &self.sinks {
            if let Err(e) = sink.publish(&report.retrieved).await {
                if e.is_fatal() {
                    return Err(e);
                }
                error!(sink = sink.name(), error = %e, "Publication failed");
                report.error.get_or_insert_with(|| e.to_string());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("source_url", &self.source_url)
            .field("max_pages", &self.max_pages)
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
