//! Randomized pacing between successive requests within a cycle

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

/// Waits a random duration within `[min_delay, max_delay]`
///
/// The orchestrator calls [`Pacer::pause`] before every per-episode source request
/// (detail-page fetch or payload retrieval) after the first in a cycle, and before
/// following a next-page link. Requests are sequential, so this is the only throttle
/// the source sees.
#[derive(Clone, Debug)]
pub struct Pacer {
    min_delay: Duration,
    max_delay: Duration,
}

impl Pacer {
    /// Create a pacer with explicit bounds (swapped if given in the wrong order)
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self {
                min_delay,
                max_delay,
            }
        } else {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        }
    }

    /// Pacer that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Pick the next delay
    pub fn next_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        let mut rng = rand::thread_rng();
        let millis = rng.gen_range(self.min_delay.as_millis()..=self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Sleep for a randomized delay
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        tracing::debug!(delay_ms = delay.as_millis(), "Pacing before next request");
        tokio::time::sleep(delay).await;
    }
}

impl From<&PacingConfig> for Pacer {
    fn from(config: &PacingConfig) -> Self {
        Self::new(config.min_delay, config.max_delay)
    }
}
