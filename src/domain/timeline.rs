//! Master timeline: minute bars with higher-timeframe indicators
//! forward-filled onto them.
//!
//! A minute at `t` sees the most recent higher-timeframe bar whose closing
//! label is `<= t`. With right-labelled windows that bar is complete, so the
//! join never looks ahead.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::resample::ResampledSeries;
use crate::domain::strategy::StrategyParams;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub bar: OhlcvBar,
    /// 4-hour StochRSI %K.
    pub trend_k: Option<f64>,
    /// 45-minute StochRSI %K.
    pub short_k: Option<f64>,
    /// 45-minute ATR.
    pub atr: Option<f64>,
    /// 4-hour ADX.
    pub adx: Option<f64>,
}

impl MasterRow {
    pub fn is_complete(&self) -> bool {
        self.trend_k.is_some() && self.short_k.is_some() && self.atr.is_some() && self.adx.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MasterTimeline {
    rows: Vec<MasterRow>,
    timestamp_index: HashMap<DateTime<Utc>, usize>,
}

impl MasterTimeline {
    pub fn new(rows: Vec<MasterRow>) -> Self {
        let timestamp_index = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.bar.timestamp, i))
            .collect();
        Self {
            rows,
            timestamp_index,
        }
    }

    pub fn rows(&self) -> &[MasterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&MasterRow> {
        self.rows.get(idx)
    }

    pub fn index_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.timestamp_index.get(&timestamp).copied()
    }

    /// Drop the leading rows that precede full indicator warm-up.
    ///
    /// Rows after the first complete row are kept even if a value later turns
    /// undefined; the simulation treats those as "no signal".
    pub fn drop_warmup(self) -> Self {
        let first = self
            .rows
            .iter()
            .position(MasterRow::is_complete)
            .unwrap_or(self.rows.len());
        if first == 0 {
            return self;
        }
        tracing::debug!(dropped = first, "dropping warm-up rows");
        Self::new(self.rows.into_iter().skip(first).collect())
    }
}

/// For each target timestamp, the index of the last source point whose
/// timestamp is `<= target`. Both inputs must be sorted ascending.
pub fn forward_fill_indices(
    targets: &[DateTime<Utc>],
    source: &[DateTime<Utc>],
) -> Vec<Option<usize>> {
    let mut out = Vec::with_capacity(targets.len());
    let mut cursor: Option<usize> = None;
    let mut next = 0usize;
    for &t in targets {
        while next < source.len() && source[next] <= t {
            cursor = Some(next);
            next += 1;
        }
        out.push(cursor);
    }
    out
}

fn fill_series<F>(targets: &[DateTime<Utc>], series: &IndicatorSeries, read: F) -> Vec<Option<f64>>
where
    F: Fn(&IndicatorPoint) -> Option<f64>,
{
    let source: Vec<DateTime<Utc>> = series.values.iter().map(|p| p.timestamp).collect();
    forward_fill_indices(targets, &source)
        .into_iter()
        .map(|idx| idx.and_then(|i| read(&series.values[i])))
        .collect()
}

fn lookup<'a>(
    map: &'a HashMap<IndicatorType, IndicatorSeries>,
    t: &IndicatorType,
) -> Option<&'a IndicatorSeries> {
    let series = map.get(t);
    if series.is_none() {
        tracing::warn!(indicator = %t, "indicator missing from computed set");
    }
    series
}

/// Compute the higher-timeframe indicators and merge everything onto the
/// minute index.
pub fn build_master_timeline(series: &ResampledSeries, params: &StrategyParams) -> MasterTimeline {
    let trend = compute_indicators(&series.h4, &params.trend_indicators());
    let short = compute_indicators(&series.m45, &params.short_indicators());

    let targets: Vec<DateTime<Utc>> = series.minute.iter().map(|b| b.timestamp).collect();
    let none = || vec![None; targets.len()];

    let stoch_k = |p: &IndicatorPoint| p.as_stochastic().map(|(k, _)| k);
    let simple = |p: &IndicatorPoint| p.as_simple();

    let trend_k = lookup(&trend, &IndicatorType::StochRsi(params.trend_stoch_rsi))
        .map_or_else(none, |s| fill_series(&targets, s, stoch_k));
    let adx = lookup(&trend, &IndicatorType::Adx(params.adx_length))
        .map_or_else(none, |s| fill_series(&targets, s, simple));
    let short_k = lookup(&short, &IndicatorType::StochRsi(params.short_stoch_rsi))
        .map_or_else(none, |s| fill_series(&targets, s, stoch_k));
    let atr = lookup(&short, &IndicatorType::Atr(params.atr_length))
        .map_or_else(none, |s| fill_series(&targets, s, simple));

    let rows = series
        .minute
        .iter()
        .enumerate()
        .map(|(i, bar)| MasterRow {
            bar: bar.clone(),
            trend_k: trend_k[i],
            short_k: short_k[i],
            atr: atr[i],
            adx: adx[i],
        })
        .collect();

    MasterTimeline::new(rows)
}
