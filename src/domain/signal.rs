//! Entry signal generators.
//!
//! A [`SignalEngine`] is evaluated on every master-timeline bar, whether or
//! not a position is open, so that stateful generators (EMA crossover,
//! opening range) see every bar. The position manager decides whether a
//! signal is actually taken.

use crate::domain::anchor::{Anchor, AnchorKind};
use crate::domain::error::AnchortraderError;
use crate::domain::position::{ActiveAvwap, Direction};
use crate::domain::strategy::RiskParams;
use crate::domain::timeline::MasterRow;
use chrono::{NaiveDate, NaiveTime};
use std::fmt;

/// A proposed entry: direction, price and protective stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySignal {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    /// Anchor behind an AVWAP entry.
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaCrossParams {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Stop distance beyond the bar extreme, in ATR.
    pub atr_multiplier: f64,
    pub adx_threshold: f64,
}

/// Which entry logic drives the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyKind {
    /// Enter at the active anchor's VWAP when the bar trades through it.
    AvwapTrend,
    /// Minute-close EMA crossover gated by the 4-hour ADX.
    MaCross(MaCrossParams),
    /// Breakout of the first bar at `open_time` each UTC day.
    OpeningRange { open_time: NaiveTime },
}

impl StrategyKind {
    pub fn validate(&self) -> Result<(), AnchortraderError> {
        match self {
            StrategyKind::AvwapTrend | StrategyKind::OpeningRange { .. } => Ok(()),
            StrategyKind::MaCross(p) => {
                if p.fast_period == 0 {
                    return Err(AnchortraderError::invalid(
                        "strategy",
                        "fast_period",
                        "fast_period must be at least 1",
                    ));
                }
                if p.slow_period <= p.fast_period {
                    return Err(AnchortraderError::invalid(
                        "strategy",
                        "slow_period",
                        "slow_period must be greater than fast_period",
                    ));
                }
                if !(p.atr_multiplier.is_finite() && p.atr_multiplier > 0.0) {
                    return Err(AnchortraderError::invalid(
                        "strategy",
                        "atr_multiplier",
                        "atr_multiplier must be positive",
                    ));
                }
                if !(0.0..=100.0).contains(&p.adx_threshold) {
                    return Err(AnchortraderError::invalid(
                        "strategy",
                        "adx_threshold",
                        "adx_threshold must be between 0 and 100",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::AvwapTrend => write!(f, "avwap_trend"),
            StrategyKind::MaCross(p) => write!(
                f,
                "ma_cross(fast={}, slow={}, atr x{}, adx > {})",
                p.fast_period, p.slow_period, p.atr_multiplier, p.adx_threshold
            ),
            StrategyKind::OpeningRange { open_time } => {
                write!(f, "opening_range(open={})", open_time.format("%H:%M"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SignalState {
    Stateless,
    MaCross {
        fast: Option<f64>,
        slow: Option<f64>,
    },
    OpeningRange {
        day: Option<NaiveDate>,
        /// (low, high) of the opening bar.
        range: Option<(f64, f64)>,
        fired: bool,
    },
}

/// A [`StrategyKind`] plus the state it carries between bars.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEngine {
    kind: StrategyKind,
    state: SignalState,
}

impl SignalEngine {
    pub fn new(kind: StrategyKind) -> Self {
        let state = match kind {
            StrategyKind::AvwapTrend => SignalState::Stateless,
            StrategyKind::MaCross(_) => SignalState::MaCross {
                fast: None,
                slow: None,
            },
            StrategyKind::OpeningRange { .. } => SignalState::OpeningRange {
                day: None,
                range: None,
                fired: false,
            },
        };
        Self { kind, state }
    }

    /// Only AVWAP entries close on a trend failure through the anchor VWAP.
    pub fn uses_avwap_exit(&self) -> bool {
        matches!(self.kind, StrategyKind::AvwapTrend)
    }

    /// Feed one bar; returns the entry this bar would trigger.
    pub fn evaluate(
        &mut self,
        row: &MasterRow,
        active: Option<&ActiveAvwap>,
        risk: &RiskParams,
    ) -> Option<EntrySignal> {
        match (self.kind, &mut self.state) {
            (StrategyKind::AvwapTrend, _) => avwap_entry(row, active, risk),
            (StrategyKind::MaCross(p), SignalState::MaCross { fast, slow }) => {
                ma_cross_entry(row, &p, fast, slow)
            }
            (
                StrategyKind::OpeningRange { open_time },
                SignalState::OpeningRange { day, range, fired },
            ) => opening_range_entry(row, open_time, day, range, fired),
            _ => None,
        }
    }
}

/// Entry at the active AVWAP when the bar's range contains it. Long is
/// checked before Short; a defined ATR is required to size the stop.
pub fn avwap_entry(
    row: &MasterRow,
    active: Option<&ActiveAvwap>,
    risk: &RiskParams,
) -> Option<EntrySignal> {
    let atr = row.atr?;
    let active = active?;
    if !row.bar.contains(active.value) {
        return None;
    }
    let direction = match active.anchor.kind {
        AnchorKind::Low => Direction::Long,
        AnchorKind::High => Direction::Short,
    };
    let unit = atr * risk.sl_multiplier;
    let stop_loss = match direction {
        Direction::Long => active.value - unit,
        Direction::Short => active.value + unit,
    };
    Some(EntrySignal {
        direction,
        entry_price: active.value,
        stop_loss,
        anchor: Some(active.anchor),
    })
}

/// EMA with alpha = 2 / (period + 1), seeded with the first input.
fn ema_step(prev: Option<f64>, value: f64, period: usize) -> f64 {
    let alpha = 2.0 / (period as f64 + 1.0);
    match prev {
        Some(p) => alpha * value + (1.0 - alpha) * p,
        None => value,
    }
}

fn ma_cross_entry(
    row: &MasterRow,
    p: &MaCrossParams,
    fast: &mut Option<f64>,
    slow: &mut Option<f64>,
) -> Option<EntrySignal> {
    let close = row.bar.close;
    let (prev_fast, prev_slow) = (*fast, *slow);
    let cur_fast = ema_step(prev_fast, close, p.fast_period);
    let cur_slow = ema_step(prev_slow, close, p.slow_period);
    *fast = Some(cur_fast);
    *slow = Some(cur_slow);

    let (prev_fast, prev_slow) = (prev_fast?, prev_slow?);
    if !row.adx.is_some_and(|adx| adx > p.adx_threshold) {
        return None;
    }
    let atr = row.atr?;

    let (direction, stop_loss) = if cur_fast > cur_slow && prev_fast <= prev_slow {
        (Direction::Long, row.bar.low - atr * p.atr_multiplier)
    } else if cur_fast < cur_slow && prev_fast >= prev_slow {
        (Direction::Short, row.bar.high + atr * p.atr_multiplier)
    } else {
        return None;
    };
    Some(EntrySignal {
        direction,
        entry_price: close,
        stop_loss,
        anchor: None,
    })
}

fn opening_range_entry(
    row: &MasterRow,
    open_time: NaiveTime,
    day: &mut Option<NaiveDate>,
    range: &mut Option<(f64, f64)>,
    fired: &mut bool,
) -> Option<EntrySignal> {
    let bar = &row.bar;
    let today = bar.timestamp.date_naive();
    if *day != Some(today) {
        *day = Some(today);
        *range = None;
        *fired = false;
    }

    if bar.timestamp.time() == open_time {
        // A flat opening bar gives no range for the day.
        *range = (bar.high > bar.low).then_some((bar.low, bar.high));
        return None;
    }
    if *fired {
        return None;
    }
    let (low, high) = (*range)?;

    let (direction, stop_loss) = if bar.high > high {
        (Direction::Long, low)
    } else if bar.low < low {
        (Direction::Short, high)
    } else {
        return None;
    };
    *fired = true;
    Some(EntrySignal {
        direction,
        entry_price: bar.close,
        stop_loss,
        anchor: None,
    })
}
