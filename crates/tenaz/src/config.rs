//! Engine configuration
//!
//! All timing constants live here with per-call overrides through
//! [`PollOptions`](crate::wait::PollOptions). Configuration can be built in
//! code or loaded from YAML:
//!
//! ```yaml
//! resolve_timeout_ms: 8000
//! poll_interval_ms: 100
//! row_match:
//!   token_overlap:
//!     min_ratio: 0.6
//! ```

use crate::result::{TenazError, TenazResult};
use crate::wait::PollOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default timeout for locator resolution (5 seconds)
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 5000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default timeout for resolving the target of an interaction (2 seconds)
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 2000;

/// Default timeout for post-condition verification (3 seconds)
pub const DEFAULT_POST_CONDITION_TIMEOUT_MS: u64 = 3000;

/// How a row is matched against an identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Some cell's trimmed text equals the identifier (case-insensitive)
    Exact,
    /// The row text contains the identifier (case-insensitive)
    #[default]
    Contains,
    /// At least `min_ratio` of the identifier's whitespace tokens appear in the row
    TokenOverlap {
        /// Fraction of identifier tokens that must be present (0.0..=1.0)
        min_ratio: f64,
    },
}

impl MatchPolicy {
    /// Check whether a row (its full text and its cell texts) matches `identifier`
    #[must_use]
    pub fn matches(&self, identifier: &str, row_text: &str, cells: &[String]) -> bool {
        let needle = identifier.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        match self {
            Self::Exact => cells.iter().any(|c| c.trim().to_lowercase() == needle),
            Self::Contains => row_text.to_lowercase().contains(&needle),
            Self::TokenOverlap { min_ratio } => {
                let haystack = row_text.to_lowercase();
                let tokens: Vec<&str> = needle.split_whitespace().collect();
                let hits = tokens.iter().filter(|t| haystack.contains(*t)).count();
                hits as f64 / tokens.len() as f64 >= *min_ratio
            }
        }
    }
}

/// Configuration shared by every component of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout for locator resolution
    pub resolve_timeout_ms: u64,
    /// Polling interval for every wait
    pub poll_interval_ms: u64,
    /// Timeout for resolving an interaction target
    pub action_timeout_ms: u64,
    /// Timeout for post-condition verification
    pub post_condition_timeout_ms: u64,
    /// Timeout for an overlay to open
    pub overlay_open_timeout_ms: u64,
    /// Timeout for an overlay to close
    pub overlay_close_timeout_ms: u64,
    /// Timeout for a table (and its rows) to render
    pub table_timeout_ms: u64,
    /// Timeout for network idle after navigation
    pub network_idle_timeout_ms: u64,
    /// How rows are matched against identifiers
    pub row_match: MatchPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_ms: DEFAULT_RESOLVE_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            post_condition_timeout_ms: DEFAULT_POST_CONDITION_TIMEOUT_MS,
            overlay_open_timeout_ms: 4000,
            overlay_close_timeout_ms: 3000,
            table_timeout_ms: 8000,
            network_idle_timeout_ms: 10_000,
            row_match: MatchPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from a YAML string
    pub fn from_yaml_str(yaml: &str) -> TenazResult<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| TenazError::Config {
            message: e.to_string(),
        })
    }

    /// Load config from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> TenazResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Set resolution timeout
    #[must_use]
    pub const fn with_resolve_timeout(mut self, timeout_ms: u64) -> Self {
        self.resolve_timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set interaction target timeout
    #[must_use]
    pub const fn with_action_timeout(mut self, timeout_ms: u64) -> Self {
        self.action_timeout_ms = timeout_ms;
        self
    }

    /// Set post-condition timeout
    #[must_use]
    pub const fn with_post_condition_timeout(mut self, timeout_ms: u64) -> Self {
        self.post_condition_timeout_ms = timeout_ms;
        self
    }

    /// Set overlay open/close timeouts
    #[must_use]
    pub const fn with_overlay_timeouts(mut self, open_ms: u64, close_ms: u64) -> Self {
        self.overlay_open_timeout_ms = open_ms;
        self.overlay_close_timeout_ms = close_ms;
        self
    }

    /// Set table timeout
    #[must_use]
    pub const fn with_table_timeout(mut self, timeout_ms: u64) -> Self {
        self.table_timeout_ms = timeout_ms;
        self
    }

    /// Set row matching policy
    #[must_use]
    pub const fn with_row_match(mut self, policy: MatchPolicy) -> Self {
        self.row_match = policy;
        self
    }

    /// Poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Options for locator resolution
    #[must_use]
    pub const fn resolve_options(&self) -> PollOptions {
        PollOptions::new(self.resolve_timeout_ms, self.poll_interval_ms)
    }

    /// Options for resolving an interaction target
    #[must_use]
    pub const fn action_options(&self) -> PollOptions {
        PollOptions::new(self.action_timeout_ms, self.poll_interval_ms)
    }

    /// Options for post-condition verification
    #[must_use]
    pub const fn post_condition_options(&self) -> PollOptions {
        PollOptions::new(self.post_condition_timeout_ms, self.poll_interval_ms)
    }

    /// Options for overlay opening
    #[must_use]
    pub const fn overlay_open_options(&self) -> PollOptions {
        PollOptions::new(self.overlay_open_timeout_ms, self.poll_interval_ms)
    }

    /// Options for overlay closing
    #[must_use]
    pub const fn overlay_close_options(&self) -> PollOptions {
        PollOptions::new(self.overlay_close_timeout_ms, self.poll_interval_ms)
    }

    /// Options for table resolution
    #[must_use]
    pub const fn table_options(&self) -> PollOptions {
        PollOptions::new(self.table_timeout_ms, self.poll_interval_ms)
    }
}
