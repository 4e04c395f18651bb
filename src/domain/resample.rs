//! Minute-bar normalisation and higher-timeframe resampling.
//!
//! Windows are right-closed and right-labelled: the bar covering
//! `(t - Δ, t]` carries label `t`. Window edges are aligned to the Unix epoch,
//! which coincides with UTC midnight for both 45-minute and 4-hour widths.

use crate::domain::ohlcv::OhlcvBar;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Minutes45,
    Hours4,
}

impl Timeframe {
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::Minutes45 => 45,
            Timeframe::Hours4 => 240,
        }
    }

    pub fn seconds(&self) -> i64 {
        i64::from(self.minutes()) * 60
    }

    /// Closing label of the window that contains `ts`.
    pub fn window_label(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let width = self.seconds();
        let secs = ts.timestamp();
        let label = (secs + width - 1).div_euclid(width) * width;
        DateTime::from_timestamp(label, 0)
    }
}

/// The three series the rest of the pipeline consumes.
#[derive(Debug, Clone, Default)]
pub struct ResampledSeries {
    pub minute: Vec<OhlcvBar>,
    pub m45: Vec<OhlcvBar>,
    pub h4: Vec<OhlcvBar>,
}

/// Sort by timestamp and drop repeated timestamps, keeping the first record.
pub fn normalize_minute_bars(mut bars: Vec<OhlcvBar>) -> Vec<OhlcvBar> {
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}

/// Aggregate a contiguous run of bars into one bar labelled with the last
/// bar's timestamp.
pub fn aggregate(bars: &[OhlcvBar]) -> Option<OhlcvBar> {
    let (first, rest) = bars.split_first()?;
    Some(rest.iter().fold(first.clone(), |acc, bar| acc.merge(bar)))
}

/// Resample ordered, de-duplicated bars into `timeframe` windows.
///
/// Windows without source bars are skipped. Empty input yields an empty
/// series.
pub fn resample(bars: &[OhlcvBar], timeframe: Timeframe) -> Vec<OhlcvBar> {
    let mut out: Vec<OhlcvBar> = Vec::new();
    let mut current: Option<(DateTime<Utc>, OhlcvBar)> = None;

    for bar in bars {
        let Some(label) = timeframe.window_label(bar.timestamp) else {
            return Vec::new();
        };
        current = match current.take() {
            Some((open_label, acc)) if open_label == label => Some((label, acc.merge(bar))),
            Some((open_label, mut acc)) => {
                acc.timestamp = open_label;
                out.push(acc);
                Some((label, bar.clone()))
            }
            None => Some((label, bar.clone())),
        };
    }

    if let Some((label, mut acc)) = current {
        acc.timestamp = label;
        out.push(acc);
    }
    out
}

/// Normalise the raw minute feed and build the 45-minute and 4-hour series.
pub fn resample_all(raw: Vec<OhlcvBar>) -> ResampledSeries {
    let minute = normalize_minute_bars(raw);
    if minute.is_empty() {
        tracing::warn!("cannot resample an empty minute series");
        return ResampledSeries::default();
    }
    let m45 = resample(&minute, Timeframe::Minutes45);
    let h4 = resample(&minute, Timeframe::Hours4);
    tracing::info!(
        minute = minute.len(),
        m45 = m45.len(),
        h4 = h4.len(),
        "resampling complete"
    );
    ResampledSeries { minute, m45, h4 }
}
