//! Runtime knobs of the batch runner and sweeper.

use searchlight_core::{CrawlerConfig, RunnerConfig};
use searchlight_crawler::RetryPolicy;
use std::time::Duration;

/// How a batch is bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Queued pages taken per batch
    pub batch_size: u32,
    /// Wall-clock budget of one batch invocation
    pub time_budget: Duration,
    /// Fetching and GEO scoring stop at `time_budget - safety_margin`
    pub safety_margin: Duration,
    /// Concurrent fetches
    pub concurrency: usize,
    /// Deepest link level enqueued
    pub max_depth: u32,
    /// Retry policy per page
    pub retry: RetryPolicy,
}

impl RunnerSettings {
    /// Settings from the runner and crawler config sections.
    #[must_use]
    pub fn from_config(runner: &RunnerConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            batch_size: runner.batch_size.max(1),
            time_budget: runner.time_budget(),
            safety_margin: runner.safety_margin(),
            concurrency: crawler.concurrency.max(1),
            max_depth: crawler.max_depth,
            retry: RetryPolicy::from_config(crawler),
        }
    }

    /// Time after batch start at which fetching and scoring stop.
    #[must_use]
    pub fn fetch_window(&self) -> Duration {
        self.time_budget.saturating_sub(self.safety_margin)
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default(), &CrawlerConfig::default())
    }
}

/// Thresholds used by the stale sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// In-progress audits idle this long are failed
    pub stale_after: Duration,
    /// Claimable audits idle this long get their continuation re-armed
    pub continuation_grace: Duration,
}

impl SweepPolicy {
    /// Policy from the runner config section.
    #[must_use]
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            stale_after: config.stale_after(),
            continuation_grace: config.continuation_grace(),
        }
    }

    /// Whole minutes of the staleness threshold, for messages.
    #[must_use]
    pub fn stale_minutes(&self) -> u64 {
        self.stale_after.as_secs() / 60
    }

    /// Failure message written on timed-out audits.
    #[must_use]
    pub fn timeout_message(&self) -> String {
        format!(
            "Audit timed out: no progress for {} minutes",
            self.stale_minutes()
        )
    }
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}
