//! Endpoint configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default pending pipe instances where the platform cannot negotiate a queue depth.
pub const DEFAULT_PENDING_INSTANCES: usize = 4;

/// Exponential backoff timing for the accept loop.
///
/// The first retry after a failed or throttled accept waits `initial_delay`;
/// each consecutive failure doubles the delay up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Short delays for tests and latency-sensitive local servers.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
        }
    }

    /// Long delays for servers that expect persistent descriptor exhaustion.
    #[must_use]
    pub const fn patient() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Clamp both delays to at least one millisecond and order them so that
    /// `initial_delay <= max_delay`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }
}

/// How `listen` derives the effective backlog from the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogStrategy {
    /// Next power of two that is at least `requested + 1`.
    PowerOfTwo,
    /// A fixed number of pending instances, ignoring the request.
    PendingInstances,
}

impl Default for BacklogStrategy {
    fn default() -> Self {
        if cfg!(windows) {
            Self::PendingInstances
        } else {
            Self::PowerOfTwo
        }
    }
}

impl BacklogStrategy {
    /// Computes the effective backlog for a `listen` call.
    pub fn effective_backlog(self, requested: usize, pending_instances: usize) -> usize {
        match self {
            Self::PowerOfTwo => requested
                .saturating_add(1)
                .checked_next_power_of_two()
                .unwrap_or(usize::MAX),
            Self::PendingInstances => pending_instances,
        }
    }
}

/// Configuration for a transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Accept loop backoff timing.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// How the effective backlog is computed.
    #[serde(default)]
    pub backlog_strategy: BacklogStrategy,

    /// Backlog used by [`BacklogStrategy::PendingInstances`].
    #[serde(default = "default_pending_instances")]
    pub pending_instances: usize,
}

fn default_pending_instances() -> usize {
    DEFAULT_PENDING_INSTANCES
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            backlog_strategy: BacklogStrategy::default(),
            pending_instances: DEFAULT_PENDING_INSTANCES,
        }
    }
}
