//! Bias state machine and AVWAP anchor tracking.
//!
//! The 4-hour StochRSI %K (`trend_k`) and ADX decide the directional bias.
//! While a bias holds, the 45-minute %K (`short_k`) marks pullbacks: the
//! extreme of the pullback floats until %K crosses back through its level,
//! at which point it is confirmed as an anchor.
//!
//! Every crossing compares the current bar against the previous bar; an
//! undefined value on either side means no crossing.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::BiasParams;
use crate::domain::timeline::MasterRow;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Bias {
    #[default]
    Neutral,
    Long,
    Short,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Neutral => write!(f, "NEUTRAL"),
            Bias::Long => write!(f, "LONG"),
            Bias::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    Low,
    High,
}

impl AnchorKind {
    /// The bar field an anchor of this kind is measured on, and which the
    /// AVWAP weights by volume.
    pub fn price_field(&self, bar: &OhlcvBar) -> f64 {
        match self {
            AnchorKind::Low => bar.low,
            AnchorKind::High => bar.high,
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorKind::Low => write!(f, "low"),
            AnchorKind::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub timestamp: DateTime<Utc>,
    pub extreme_price: f64,
    pub kind: AnchorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    BiasChanged { from: Bias, to: Bias },
    AnchorConfirmed(Anchor),
    /// A confirmed anchor was dropped because the bias flipped against it.
    AnchorInvalidated(AnchorKind),
}

fn crossed_up(prev: Option<f64>, cur: Option<f64>, level: f64) -> bool {
    matches!((prev, cur), (Some(p), Some(c)) if p < level && c >= level)
}

fn crossed_down(prev: Option<f64>, cur: Option<f64>, level: f64) -> bool {
    matches!((prev, cur), (Some(p), Some(c)) if p > level && c <= level)
}

#[derive(Debug, Clone, Default)]
pub struct AnchorTracker {
    bias: Bias,
    prev_trend_k: Option<f64>,
    prev_short_k: Option<f64>,
    floating_low: Option<Anchor>,
    floating_high: Option<Anchor>,
    confirmed_low: Option<Anchor>,
    confirmed_high: Option<Anchor>,
}

impl AnchorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bias(&self) -> Bias {
        self.bias
    }

    pub fn confirmed(&self, kind: AnchorKind) -> Option<&Anchor> {
        match kind {
            AnchorKind::Low => self.confirmed_low.as_ref(),
            AnchorKind::High => self.confirmed_high.as_ref(),
        }
    }

    pub fn floating(&self, kind: AnchorKind) -> Option<&Anchor> {
        match kind {
            AnchorKind::Low => self.floating_low.as_ref(),
            AnchorKind::High => self.floating_high.as_ref(),
        }
    }

    /// The more recent of the two confirmed anchors. Equal timestamps leave
    /// neither active.
    pub fn active_anchor(&self) -> Option<&Anchor> {
        match (&self.confirmed_low, &self.confirmed_high) {
            (Some(low), Some(high)) => {
                if low.timestamp > high.timestamp {
                    Some(low)
                } else if high.timestamp > low.timestamp {
                    Some(high)
                } else {
                    None
                }
            }
            (Some(low), None) => Some(low),
            (None, Some(high)) => Some(high),
            (None, None) => None,
        }
    }

    /// Advance the tracker by one bar and report what changed.
    pub fn update(&mut self, row: &MasterRow, params: &BiasParams) -> Vec<TrackerEvent> {
        let mut events = Vec::new();

        if let Some(next) = self.next_bias(row, params) {
            events.push(TrackerEvent::BiasChanged {
                from: self.bias,
                to: next,
            });
            self.bias = next;
            match next {
                Bias::Long => {
                    self.floating_high = None;
                    if self.confirmed_high.take().is_some() {
                        events.push(TrackerEvent::AnchorInvalidated(AnchorKind::High));
                    }
                }
                Bias::Short => {
                    self.floating_low = None;
                    if self.confirmed_low.take().is_some() {
                        events.push(TrackerEvent::AnchorInvalidated(AnchorKind::Low));
                    }
                }
                Bias::Neutral => {}
            }
        }

        self.track_setups(row, params);

        if let Some(anchor) = self.try_confirm(row, params) {
            events.push(TrackerEvent::AnchorConfirmed(anchor));
        }

        self.prev_trend_k = row.trend_k;
        self.prev_short_k = row.short_k;

        for event in &events {
            tracing::debug!(timestamp = %row.bar.timestamp, ?event, "tracker");
        }
        events
    }

    /// At most one transition per bar, checked in a fixed order: long entry,
    /// short exit, short entry, long exit.
    fn next_bias(&self, row: &MasterRow, p: &BiasParams) -> Option<Bias> {
        let (prev, cur) = (self.prev_trend_k, row.trend_k);
        let trending = row.adx.is_some_and(|adx| adx > p.adx_threshold);

        if self.bias != Bias::Long && crossed_up(prev, cur, p.oversold_level) && trending {
            return Some(Bias::Long);
        }
        if self.bias == Bias::Short && crossed_down(prev, cur, p.oversold_level) {
            return Some(Bias::Neutral);
        }
        if self.bias != Bias::Short && crossed_down(prev, cur, p.overbought_level) && trending {
            return Some(Bias::Short);
        }
        if self.bias == Bias::Long && crossed_up(prev, cur, p.overbought_level) {
            return Some(Bias::Neutral);
        }
        None
    }

    fn track_setups(&mut self, row: &MasterRow, p: &BiasParams) {
        let bar = &row.bar;

        let long_setup =
            self.bias == Bias::Long && row.short_k.is_some_and(|k| k < p.oversold_level);
        if long_setup {
            let entering = self.prev_short_k.is_some_and(|k| k >= p.oversold_level);
            let lower = self
                .floating_low
                .is_none_or(|a| bar.low < a.extreme_price);
            if entering || lower {
                self.floating_low = Some(Anchor {
                    timestamp: bar.timestamp,
                    extreme_price: bar.low,
                    kind: AnchorKind::Low,
                });
            }
        }

        let short_setup =
            self.bias == Bias::Short && row.short_k.is_some_and(|k| k > p.overbought_level);
        if short_setup {
            let entering = self.prev_short_k.is_some_and(|k| k <= p.overbought_level);
            let higher = self
                .floating_high
                .is_none_or(|a| bar.high > a.extreme_price);
            if entering || higher {
                self.floating_high = Some(Anchor {
                    timestamp: bar.timestamp,
                    extreme_price: bar.high,
                    kind: AnchorKind::High,
                });
            }
        }
    }

    fn try_confirm(&mut self, row: &MasterRow, p: &BiasParams) -> Option<Anchor> {
        let (prev, cur) = (self.prev_short_k, row.short_k);
        if self.bias == Bias::Long && crossed_up(prev, cur, p.oversold_level) {
            if let Some(anchor) = self.floating_low.take() {
                self.confirmed_low = Some(anchor);
                return Some(anchor);
            }
        }
        if self.bias == Bias::Short && crossed_down(prev, cur, p.overbought_level) {
            if let Some(anchor) = self.floating_high.take() {
                self.confirmed_high = Some(anchor);
                return Some(anchor);
            }
        }
        None
    }
}

/// Run a fresh tracker over `rows` and return the bias after each bar.
pub fn replay_bias(rows: &[MasterRow], params: &BiasParams) -> Vec<Bias> {
    let mut tracker = AnchorTracker::new();
    rows.iter()
        .map(|row| {
            tracker.update(row, params);
            tracker.bias()
        })
        .collect()
}
