//! Stochastic RSI.
//!
//! raw %K = 100 * (RSI - min(RSI, length)) / (max(RSI, length) - min(RSI, length))
//! %K     = SMA(raw %K, k)
//! %D     = SMA(%K, d)
//!
//! A flat RSI window (max == min) has no defined %K; that point and the
//! smoothing windows that include it stay invalid.

use crate::domain::indicator::rsi::rsi_values;
use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, StochRsiParams, sma_of,
};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_stoch_rsi(bars: &[OhlcvBar], params: StochRsiParams) -> IndicatorSeries {
    let indicator_type = IndicatorType::StochRsi(params);
    if params.length == 0 || params.rsi_length == 0 || params.k == 0 || params.d == 0 {
        return IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint::invalid(b.timestamp))
                .collect(),
        };
    }

    let rsi = rsi_values(bars, params.rsi_length);
    let raw = stochastic_of(&rsi, params.length);
    let k_line = sma_of(&raw, params.k);
    let d_line = sma_of(&k_line, params.d);

    let values = bars
        .iter()
        .zip(k_line.iter().zip(&d_line))
        .map(|(bar, (k, d))| match (k, d) {
            (Some(k), Some(d)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Stochastic { k: *k, d: *d },
            },
            _ => IndicatorPoint::invalid(bar.timestamp),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

fn stochastic_of(input: &[Option<f64>], length: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    for i in (length - 1)..input.len() {
        let window = &input[i + 1 - length..=i];
        let (Some(current), true) = (input[i], window.iter().all(Option::is_some)) else {
            continue;
        };
        let lo = window.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        let hi = window
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let range = hi - lo;
        if range > 0.0 {
            out[i] = Some(100.0 * (current - lo) / range);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap()
    }

    fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                timestamp: start() + Duration::hours(4 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn params() -> StochRsiParams {
        StochRsiParams {
            length: 5,
            rsi_length: 3,
            k: 2,
            d: 2,
        }
    }

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + ((i * 7) % 11) as f64 - (i % 3) as f64 * 1.5)
            .collect()
    }

    #[test]
    fn warmup_matches_params() {
        let p = params();
        let series = calculate_stoch_rsi(&make_bars(&zigzag(30)), p);
        let first_valid = series.values.iter().position(|v| v.valid).unwrap();
        assert_eq!(first_valid, p.warmup() - 1);
        assert!(series.values[..first_valid].iter().all(|v| v.as_stochastic().is_none()));
    }

    #[test]
    fn values_stay_in_bounds() {
        let series = calculate_stoch_rsi(&make_bars(&zigzag(60)), params());
        for (k, d) in series.values.iter().filter_map(|p| p.as_stochastic()) {
            assert!((0.0..=100.0).contains(&k), "k {} out of range", k);
            assert!((0.0..=100.0).contains(&d), "d {} out of range", d);
        }
    }

    #[test]
    fn d_is_sma_of_k() {
        let series = calculate_stoch_rsi(&make_bars(&zigzag(40)), params());
        let pts: Vec<(f64, f64)> = series
            .values
            .iter()
            .filter_map(|p| p.as_stochastic())
            .collect();
        for w in pts.windows(2) {
            let expected = (w[0].0 + w[1].0) / 2.0;
            assert!((w[1].1 - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn flat_rsi_window_is_undefined() {
        // Monotonic rise pins RSI at 100, so every window is flat.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let series = calculate_stoch_rsi(&make_bars(&closes), params());
        assert_eq!(series.valid_count(), 0);
    }

    #[test]
    fn zero_parameter_is_all_invalid() {
        let mut p = params();
        p.k = 0;
        let series = calculate_stoch_rsi(&make_bars(&zigzag(30)), p);
        assert_eq!(series.values.len(), 30);
        assert_eq!(series.valid_count(), 0);
    }

    #[test]
    fn raw_stochastic_known_values() {
        let input = vec![Some(10.0), Some(20.0), Some(15.0), Some(30.0)];
        let out = stochastic_of(&input, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 50.0).abs() < 1e-12);
        assert!((out[3].unwrap() - 100.0).abs() < 1e-12);
    }
}
