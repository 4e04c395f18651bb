//! Data access port trait.
//!
//! A data port hands the pipeline raw 1-minute bars. Sessions, credentials
//! and retries belong to the implementation, never to the domain.

use crate::domain::error::AnchortraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::{DateTime, Utc};

pub trait DataPort {
    /// Human-readable origin of the bars, used in error messages.
    fn source_name(&self) -> String;

    /// Minute bars with `start <= timestamp <= end`; an open bound is
    /// unbounded. Order and uniqueness are not guaranteed.
    fn fetch_minute_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcvBar>, AnchortraderError>;

    /// First and last timestamp plus bar count, or `None` when empty.
    fn get_data_range(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, AnchortraderError> {
        let bars = self.fetch_minute_bars(None, None)?;
        let first = bars.iter().map(|b| b.timestamp).min();
        let last = bars.iter().map(|b| b.timestamp).max();
        Ok(first.zip(last).map(|(f, l)| (f, l, bars.len())))
    }
}
