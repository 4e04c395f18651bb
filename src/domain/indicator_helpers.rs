//! Shared helper functions for indicator calculations.

use crate::domain::indicator::adx::calculate_adx;
use crate::domain::indicator::stoch_rsi::calculate_stoch_rsi;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use std::collections::HashMap;

/// Wilder ATR: seeded with the mean of the first `period` true ranges, then
/// `(prev * (period - 1) + tr) / period`. The first bar's true range is
/// `high - low`.
pub fn calc_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut results: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    if period == 0 {
        results.extend(bars.iter().map(|b| IndicatorPoint::invalid(b.timestamp)));
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: results,
        };
    }

    let mut seed_sum = 0.0;
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };

        if i < period - 1 {
            seed_sum += tr;
            results.push(IndicatorPoint::invalid(bar.timestamp));
        } else if i == period - 1 {
            seed_sum += tr;
            atr = seed_sum / period as f64;
            results.push(IndicatorPoint::simple(bar.timestamp, atr));
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
            results.push(IndicatorPoint::simple(bar.timestamp, atr));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values: results,
    }
}

/// Compute each requested indicator once over `bars`.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out = HashMap::with_capacity(types.len());
    for t in types {
        if out.contains_key(t) {
            continue;
        }
        let series = match t {
            IndicatorType::Atr(n) => calc_atr(bars, *n),
            IndicatorType::Adx(n) => calculate_adx(bars, *n),
            IndicatorType::StochRsi(p) => calculate_stoch_rsi(bars, *p),
        };
        tracing::debug!(
            indicator = %t,
            bars = bars.len(),
            valid = series.valid_count(),
            "indicator computed"
        );
        out.insert(t.clone(), series);
    }
    out
}
