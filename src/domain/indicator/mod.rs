//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Points inside an indicator's warm-up window carry `valid == false`. Readers
//! go through [`IndicatorPoint::as_simple`] / [`IndicatorPoint::as_stochastic`],
//! which turn those points into `None` instead of a placeholder zero.

pub mod adx;
pub mod rsi;
pub mod stoch_rsi;

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn invalid(timestamp: DateTime<Utc>) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value: IndicatorValue::Simple(0.0),
        }
    }

    pub fn simple(timestamp: DateTime<Utc>, value: f64) -> Self {
        IndicatorPoint {
            timestamp,
            valid: value.is_finite(),
            value: IndicatorValue::Simple(value),
        }
    }

    pub fn as_simple(&self) -> Option<f64> {
        match self.value {
            IndicatorValue::Simple(v) if self.valid => Some(v),
            _ => None,
        }
    }

    pub fn as_stochastic(&self) -> Option<(f64, f64)> {
        match self.value {
            IndicatorValue::Stochastic { k, d } if self.valid => Some((k, d)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Stochastic { k: f64, d: f64 },
}

/// Parameters of a Stochastic RSI line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StochRsiParams {
    pub length: usize,
    pub rsi_length: usize,
    pub k: usize,
    pub d: usize,
}

impl StochRsiParams {
    /// Bars needed before %D becomes valid.
    pub fn warmup(&self) -> usize {
        self.rsi_length + self.length + self.k + self.d - 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Atr(usize),
    Adx(usize),
    StochRsi(StochRsiParams),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|p| p.valid).count()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::StochRsi(p) => {
                write!(f, "STOCHRSI({},{},{},{})", p.length, p.rsi_length, p.k, p.d)
            }
        }
    }
}

/// Simple moving average over the valid tail of `input`.
///
/// A window is valid only when all `period` inputs are `Some`.
pub(crate) fn sma_of(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..input.len() {
        let window = &input[i + 1 - period..=i];
        if window.iter().all(Option::is_some) {
            let sum: f64 = window.iter().flatten().sum();
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

/// Wilder smoothing (alpha = 1/period) seeded by the mean of the first
/// `period` defined inputs. Leading `None`s are skipped; later `None`s yield
/// `None` and leave the running value untouched.
pub(crate) fn wilder_smooth(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }
    let mut seed_sum = 0.0;
    let mut seen = 0usize;
    let mut prev: Option<f64> = None;

    for (i, value) in input.iter().enumerate() {
        let Some(x) = *value else {
            continue;
        };
        match prev {
            None => {
                seed_sum += x;
                seen += 1;
                if seen == period {
                    let seed = seed_sum / period as f64;
                    prev = Some(seed);
                    out[i] = Some(seed);
                }
            }
            Some(p) => {
                let next = (p * (period - 1) as f64 + x) / period as f64;
                prev = Some(next);
                out[i] = Some(next);
            }
        }
    }
    out
}
