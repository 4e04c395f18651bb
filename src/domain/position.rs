//! Position state machine: entries from an [`EntrySignal`], target and
//! breakeven sized from the stop distance, and the fixed exit priority.

use crate::domain::anchor::{Anchor, AnchorKind};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::EntrySignal;
use crate::domain::strategy::RiskParams;
use crate::domain::timeline::MasterRow;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    /// Stop hit after it had been moved to the entry price.
    Breakeven,
    TakeProfit,
    /// Close on the wrong side of the anchored VWAP.
    TrendFailure,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "StopLoss",
            ExitReason::Breakeven => "Breakeven",
            ExitReason::TakeProfit => "TakeProfit",
            ExitReason::TrendFailure => "TrendFailure",
        };
        write!(f, "{s}")
    }
}

/// Indicator values captured when a position opens.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    /// Anchored VWAP the entry was taken at.
    pub avwap: Option<f64>,
    pub trend_k: Option<f64>,
    pub short_k: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn from_row(row: &MasterRow) -> Self {
        Self {
            avwap: None,
            trend_k: row.trend_k,
            short_k: row.short_k,
            atr: row.atr,
            adx: row.adx,
        }
    }
}

/// AVWAP of the currently active anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveAvwap {
    pub anchor: Anchor,
    pub value: f64,
}

fn avwap_for(active: Option<&ActiveAvwap>, kind: AnchorKind) -> Option<f64> {
    active.filter(|a| a.anchor.kind == kind).map(|a| a.value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub breakeven_trigger: f64,
    pub breakeven_armed: bool,
    pub entry_timestamp: DateTime<Utc>,
    /// Set for AVWAP entries only.
    pub anchor: Option<Anchor>,
    pub entry_context: IndicatorSnapshot,
}

impl Position {
    /// Target and breakeven trigger are multiples of the entry-to-stop
    /// distance.
    pub fn open(
        direction: Direction,
        entry_price: f64,
        stop_loss: f64,
        risk: &RiskParams,
        entry_timestamp: DateTime<Utc>,
        anchor: Option<Anchor>,
        entry_context: IndicatorSnapshot,
    ) -> Self {
        let unit = (entry_price - stop_loss).abs();
        let sign = match direction {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        };
        Self {
            direction,
            entry_price,
            stop_loss,
            take_profit: entry_price + sign * unit * risk.tp_multiplier,
            breakeven_trigger: entry_price + sign * unit * risk.breakeven_trigger_r,
            breakeven_armed: false,
            entry_timestamp,
            anchor,
            entry_context,
        }
    }

    /// Move the stop to the entry price once the trigger trades. Never
    /// disarms.
    pub fn try_arm_breakeven(&mut self, bar: &OhlcvBar) -> bool {
        if self.breakeven_armed {
            return false;
        }
        let reached = match self.direction {
            Direction::Long => bar.high >= self.breakeven_trigger,
            Direction::Short => bar.low <= self.breakeven_trigger,
        };
        if reached {
            self.stop_loss = self.entry_price;
            self.breakeven_armed = true;
        }
        reached
    }

    pub fn stop_hit(&self, bar: &OhlcvBar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.stop_loss,
            Direction::Short => bar.high >= self.stop_loss,
        }
    }

    pub fn target_hit(&self, bar: &OhlcvBar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.take_profit,
            Direction::Short => bar.low <= self.take_profit,
        }
    }

    /// Close through the AVWAP against the position. Undefined AVWAP never
    /// fails the trend.
    pub fn trend_failed(&self, bar: &OhlcvBar, avwap: Option<f64>) -> bool {
        match (self.direction, avwap) {
            (Direction::Long, Some(v)) => bar.close < v,
            (Direction::Short, Some(v)) => bar.close > v,
            (_, None) => false,
        }
    }

    pub fn pnl(&self, exit_price: f64) -> f64 {
        match self.direction {
            Direction::Long => exit_price - self.entry_price,
            Direction::Short => self.entry_price - exit_price,
        }
    }

    fn close(self, exit_timestamp: DateTime<Utc>, exit_price: f64, exit_reason: ExitReason) -> Trade {
        Trade {
            direction: self.direction,
            entry_timestamp: self.entry_timestamp,
            exit_timestamp,
            entry_price: self.entry_price,
            exit_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            anchor: self.anchor,
            entry_context: self.entry_context,
            exit_reason,
            pnl: self.pnl(exit_price),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub direction: Direction,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Stop level at exit (the entry price once breakeven armed).
    pub stop_loss: f64,
    pub take_profit: f64,
    pub anchor: Option<Anchor>,
    pub entry_context: IndicatorSnapshot,
    pub exit_reason: ExitReason,
    /// Profit in price points.
    pub pnl: f64,
}

impl Trade {
    pub fn holding_minutes(&self) -> i64 {
        (self.exit_timestamp - self.entry_timestamp).num_minutes()
    }
}

/// Zero or one open position plus the risk settings that size it.
#[derive(Debug, Clone)]
pub struct PositionManager {
    risk: RiskParams,
    position: Option<Position>,
}

impl PositionManager {
    pub fn new(risk: RiskParams) -> Self {
        Self {
            risk,
            position: None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn into_position(self) -> Option<Position> {
        self.position
    }

    /// Exit checks for the open position, in order: breakeven arm, stop,
    /// take-profit, trend failure. At most one exit per bar.
    pub fn check_exit(&mut self, bar: &OhlcvBar, active: Option<&ActiveAvwap>) -> Option<Trade> {
        let pos = self.position.as_mut()?;

        if pos.try_arm_breakeven(bar) {
            tracing::debug!(timestamp = %bar.timestamp, stop = pos.stop_loss, "breakeven armed");
        }

        let exit = if pos.stop_hit(bar) {
            let reason = if pos.breakeven_armed {
                ExitReason::Breakeven
            } else {
                ExitReason::StopLoss
            };
            Some((pos.stop_loss, reason))
        } else if pos.target_hit(bar) {
            Some((pos.take_profit, ExitReason::TakeProfit))
        } else {
            let kind = match pos.direction {
                Direction::Long => AnchorKind::Low,
                Direction::Short => AnchorKind::High,
            };
            pos.trend_failed(bar, avwap_for(active, kind))
                .then_some((bar.close, ExitReason::TrendFailure))
        };

        let (price, reason) = exit?;
        let trade = self.position.take()?.close(bar.timestamp, price, reason);
        tracing::info!(
            direction = %trade.direction,
            entry = trade.entry_price,
            exit = trade.exit_price,
            reason = %trade.exit_reason,
            pnl = trade.pnl,
            "position closed"
        );
        Some(trade)
    }

    /// Take `signal` on `row`'s bar. Requires a flat book and a stop on the
    /// losing side of the entry.
    pub fn enter(&mut self, signal: EntrySignal, row: &MasterRow) -> Option<&Position> {
        if self.position.is_some() {
            return None;
        }
        let distance = match signal.direction {
            Direction::Long => signal.entry_price - signal.stop_loss,
            Direction::Short => signal.stop_loss - signal.entry_price,
        };
        if !(distance.is_finite() && distance > 0.0) {
            tracing::debug!(
                timestamp = %row.bar.timestamp,
                entry = signal.entry_price,
                stop = signal.stop_loss,
                "signal skipped: no risk distance"
            );
            return None;
        }

        let position = Position::open(
            signal.direction,
            signal.entry_price,
            signal.stop_loss,
            &self.risk,
            row.bar.timestamp,
            signal.anchor,
            IndicatorSnapshot {
                avwap: signal.anchor.map(|_| signal.entry_price),
                ..IndicatorSnapshot::from_row(row)
            },
        );
        tracing::info!(
            timestamp = %row.bar.timestamp,
            direction = %signal.direction,
            entry = position.entry_price,
            stop = position.stop_loss,
            target = position.take_profit,
            "position opened"
        );
        self.position = Some(position);
        self.position.as_ref()
    }
}
