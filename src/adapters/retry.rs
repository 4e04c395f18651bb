//! Bounded retry around any [`DataPort`].
//!
//! Transient failures (`DataSource`, `Io`) are retried with exponential
//! backoff up to `max_attempts` total attempts; the last error is returned
//! once the budget is spent. Anything else fails immediately.

use crate::domain::config_validation::optional;
use crate::domain::error::AnchortraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// `[data] retry_attempts` and `retry_backoff_ms`. Absent keys take the
    /// defaults; unparsable ones are invalid.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AnchortraderError> {
        let defaults = Self::default();
        let attempts: i64 = optional(config, "data", "retry_attempts")?
            .unwrap_or(i64::from(defaults.max_attempts));
        if !(1..=20).contains(&attempts) {
            return Err(AnchortraderError::invalid(
                "data",
                "retry_attempts",
                "retry_attempts must be between 1 and 20",
            ));
        }
        let backoff_ms: i64 = optional(config, "data", "retry_backoff_ms")?
            .unwrap_or(defaults.initial_backoff.as_millis() as i64);
        if backoff_ms < 0 {
            return Err(AnchortraderError::invalid(
                "data",
                "retry_backoff_ms",
                "retry_backoff_ms must be non-negative",
            ));
        }
        Ok(Self {
            max_attempts: attempts as u32,
            initial_backoff: Duration::from_millis(backoff_ms as u64),
            multiplier: defaults.multiplier,
        })
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(self.multiplier.saturating_pow(retry.saturating_sub(1)))
    }
}

fn is_transient(err: &AnchortraderError) -> bool {
    matches!(
        err,
        AnchortraderError::DataSource { .. } | AnchortraderError::Io(_)
    )
}

pub struct RetryingDataPort<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: DataPort> RetryingDataPort<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn with_retry<T>(
        &self,
        op: impl Fn(&P) -> Result<T, AnchortraderError>,
    ) -> Result<T, AnchortraderError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(&self.inner) {
                Ok(v) => return Ok(v),
                Err(e) if is_transient(&e) && attempt < attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        source = %self.inner.source_name(),
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "data fetch failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<P: DataPort> DataPort for RetryingDataPort<P> {
    fn source_name(&self) -> String {
        self.inner.source_name()
    }

    fn fetch_minute_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcvBar>, AnchortraderError> {
        self.with_retry(|p| p.fetch_minute_bars(start, end))
    }

    fn get_data_range(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, AnchortraderError> {
        self.with_retry(|p| p.get_data_range())
    }
}
