//! Values threaded through and produced by polling cycles.

use crate::error::Error;
use crate::types::EpisodeRecord;
use std::collections::HashSet;

/// Accumulated state carried from one cycle into the next
///
/// Each call to [`super::FetchOrchestrator::run_cycle`] consumes a state and returns the
/// next one. Pagination is per cycle and never lives here.
#[derive(Clone, Debug, Default)]
pub struct OrchestratorState {
    /// Cycles completed so far
    pub cycles_run: u64,
    /// Episodes retrieved (or handed off) across all cycles
    pub total_retrieved: u64,
    /// Cycles that ended with an error
    pub failed_cycles: u64,
    /// Outcome of the most recent cycle
    pub last_report: Option<CycleReport>,
}

impl OrchestratorState {
    /// Fold a finished cycle into the state
    pub fn advance(self, report: CycleReport) -> Self {
        Self {
            cycles_run: self.cycles_run + 1,
            total_retrieved: self.total_retrieved + report.retrieved.len() as u64,
            failed_cycles: self.failed_cycles + u64::from(report.error.is_some()),
            last_report: Some(report),
        }
    }
}

/// A fatal error together with the state accumulated before it
///
/// The failed cycle is already folded into `state`, so episodes it retrieved
/// before the error still count.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Halted {
    /// State including the cycle that failed
    pub state: OrchestratorState,
    /// What stopped the run
    pub error: Error,
}

impl From<Error> for Halted {
    /// A failure before any cycle ran
    fn from(error: Error) -> Self {
        Self {
            state: OrchestratorState::default(),
            error,
        }
    }
}

impl From<Halted> for Error {
    fn from(halted: Halted) -> Self {
        halted.error
    }
}

/// Page-walking position within one cycle
///
/// A URL is visited at most once; a next-page link pointing back at a visited page
/// ends pagination.
#[derive(Clone, Debug)]
pub struct PaginationCursor {
    current_url: String,
    visited: HashSet<String>,
    pages_remaining: usize,
}

impl PaginationCursor {
    /// Cursor positioned on the first page, allowing `max_pages` pages in total
    pub fn new(start_url: impl Into<String>, max_pages: usize) -> Self {
        let current_url = start_url.into();
        let mut visited = HashSet::new();
        visited.insert(current_url.clone());
        Self {
            current_url,
            visited,
            pages_remaining: max_pages.saturating_sub(1),
        }
    }

    /// Page to fetch now
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Pages still allowed after the current one
    pub fn pages_remaining(&self) -> usize {
        self.pages_remaining
    }

    /// Number of distinct pages visited
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Move to `next_url` if the lookback budget allows and it is unvisited
    pub fn advance(&mut self, next_url: &str) -> Advance {
        if self.pages_remaining == 0 {
            return Advance::BudgetExhausted;
        }
        if !self.visited.insert(next_url.to_string()) {
            return Advance::AlreadyVisited;
        }
        self.pages_remaining -= 1;
        self.current_url = next_url.to_string();
        Advance::Moved
    }
}

/// Outcome of [`PaginationCursor::advance`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// The cursor now points at the next page
    Moved,
    /// The lookback page limit is reached
    BudgetExhausted,
    /// The link leads back to a page seen this cycle
    AlreadyVisited,
}

/// What happened during one cycle
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    /// 1-based cycle number within this process
    pub cycle: u64,
    /// Pages fetched successfully
    pub pages_fetched: usize,
    /// Relevant candidates extracted across all pages
    pub candidates: usize,
    /// Candidates already in the ledger
    pub skipped: usize,
    /// Candidates whose resolution or retrieval failed
    pub failed: usize,
    /// New episodes retrieved or handed off, in document order
    pub retrieved: Vec<EpisodeRecord>,
    /// A page lacked the expected container
    pub structure_mismatch: bool,
    /// Error that cut the cycle short or failed publication
    pub error: Option<String>,
}

impl CycleReport {
    /// Empty report for cycle `cycle`
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_respects_lookback_budget() {
        let mut cursor = PaginationCursor::new("https://s/", 3);
        assert_eq!(cursor.advance("https://s/?page=2"), Advance::Moved);
        assert_eq!(cursor.advance("https://s/?page=3"), Advance::Moved);
        assert_eq!(cursor.advance("https://s/?page=4"), Advance::BudgetExhausted);
        assert_eq!(cursor.current_url(), "https://s/?page=3");
        assert_eq!(cursor.visited_count(), 3);
    }

    #[test]
    fn cursor_breaks_cycles() {
        let mut cursor = PaginationCursor::new("https://s/", 10);
        assert_eq!(cursor.advance("https://s/?page=2"), Advance::Moved);
        assert_eq!(cursor.advance("https://s/"), Advance::AlreadyVisited);
        assert_eq!(cursor.current_url(), "https://s/?page=2");
        assert_eq!(cursor.pages_remaining(), 8);
    }

    #[test]
    fn single_page_budget_never_advances() {
        let mut cursor = PaginationCursor::new("https://s/", 1);
        assert_eq!(cursor.advance("https://s/?page=2"), Advance::BudgetExhausted);
    }

    #[test]
    fn state_accumulates_counters() {
        let mut report = CycleReport::new(1);
        report.retrieved.push(EpisodeRecord::new("Coast A", "r"));
        let state = OrchestratorState::default().advance(report);

        let failed = CycleReport {
            error: Some("fetch error".to_string()),
            ..CycleReport::new(2)
        };
        let state = state.advance(failed);

        assert_eq!(state.cycles_run, 2);
        assert_eq!(state.total_retrieved, 1);
        assert_eq!(state.failed_cycles, 1);
        assert_eq!(state.last_report.unwrap().cycle, 2);
    }
}
