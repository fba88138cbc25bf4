// Backoff between soft-eviction attempts while draining a displaced pool

use crate::config::{BackoffKind, DynamicDataSourceConfig};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay strategy for the drain loop
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    /// Delay to wait after the given eviction attempt (1-based)
    fn delay(&self, attempt: u32) -> Duration;
}

/// Same delay after every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Doubling backoff with optional jitter
/// Sequence for base 500ms: 500ms, 1s, 2s, 4s, ... capped at `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    /// Jitter factor (0.0 to 1.0)
    jitter_factor: f64,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    fn calculate_base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let jitter_range_ms = (delay.as_millis() as f64 * self.jitter_factor) as u64;
        if jitter_range_ms == 0 {
            return delay;
        }

        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_range_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.add_jitter(self.calculate_base_delay(attempt))
    }
}

/// Build the configured strategy
pub fn from_config(config: &DynamicDataSourceConfig) -> Arc<dyn BackoffStrategy> {
    let interval = Duration::from_millis(config.shutdown_retry_interval_ms);
    match config.backoff {
        BackoffKind::Fixed => Arc::new(FixedDelay::new(interval)),
        BackoffKind::Exponential => Arc::new(ExponentialBackoff::new(
            interval,
            Duration::from_millis(config.max_backoff_ms).max(interval),
            0.1,
        )),
    }
}
