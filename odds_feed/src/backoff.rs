//! Linear reconnect backoff with a capped delay.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Configuration for reconnection delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay added per consecutive failed attempt
    pub step: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { step: Duration::from_secs(5), max_delay: Duration::from_secs(60) }
    }
}

/// Attempt counter driving reconnect delays.
///
/// Starts at 1, grows by one per failed attempt and is reset to 1 by a successful
/// connect. There is no retry limit, only the delay cap.
#[derive(Debug)]
pub struct ReconnectBackoff {
    config: BackoffConfig,
    attempt: AtomicU32,
}

impl ReconnectBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: AtomicU32::new(1) }
    }

    pub fn config(&self) -> BackoffConfig {
        self.config
    }

    /// Current attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Delay to wait before retrying after the current attempt failed
    pub fn delay(&self) -> Duration {
        self.delay_for(self.attempt())
    }

    /// `min(attempt * step, max_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.config.step.saturating_mul(attempt.max(1)).min(self.config.max_delay)
    }

    /// Move to the next attempt, returning its number
    pub fn advance(&self) -> u32 {
        self.attempt.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    pub fn reset(&self) {
        self.attempt.store(1, Ordering::Release);
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
