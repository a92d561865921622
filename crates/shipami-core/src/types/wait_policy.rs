//! Polling policy for waits on asynchronous image and snapshot transitions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff and bound for state polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WaitPolicy {
    /// Delay before the second poll, in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single poll delay, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Overall bound in seconds; 0 waits forever
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_initial_delay() -> u64 {
    2000
}
fn default_max_delay() -> u64 {
    15000
}
fn default_backoff_multiplier() -> f64 {
    1.5
}
fn default_timeout() -> u64 {
    3600 // 1 hour
}

impl WaitPolicy {
    /// Delay to sleep after the given (1-indexed) poll
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt_index = attempt.saturating_sub(1);
        let multiplier = self.backoff_multiplier.max(1.0).powf(attempt_index as f64);
        let base_delay_ms = (self.initial_delay_ms as f64 * multiplier) as u64;

        Duration::from_millis(base_delay_ms.min(self.max_delay_ms))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}
