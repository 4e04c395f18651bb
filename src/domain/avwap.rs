//! Anchored VWAP.
//!
//! AVWAP = Σ(price × volume) / Σ(volume) from the anchor bar through the
//! current bar, with price = `low` for Low anchors and `high` for High
//! anchors. The engine keeps running sums per anchor kind and adds one bar
//! per step; [`avwap_over_window`] is the full-scan reference.

use crate::domain::anchor::{Anchor, AnchorKind};
use crate::domain::error::AnchortraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeline::{MasterRow, MasterTimeline};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvwapAccumulator {
    price_volume: f64,
    volume: f64,
}

impl AvwapAccumulator {
    pub fn add(&mut self, bar: &OhlcvBar, kind: AnchorKind) {
        self.price_volume += kind.price_field(bar) * bar.volume;
        self.volume += bar.volume;
    }

    /// `None` while cumulative volume is zero.
    pub fn value(&self) -> Option<f64> {
        if self.volume > 0.0 {
            Some(self.price_volume / self.volume)
        } else {
            None
        }
    }
}

/// AVWAP over `rows[anchor_idx..=current_idx]` by full scan. `None` for an
/// empty or out-of-range window and for zero volume.
pub fn avwap_over_window(
    rows: &[MasterRow],
    anchor_idx: usize,
    current_idx: usize,
    kind: AnchorKind,
) -> Option<f64> {
    if anchor_idx > current_idx {
        return None;
    }
    let window = rows.get(anchor_idx..=current_idx)?;
    let mut acc = AvwapAccumulator::default();
    for row in window {
        acc.add(&row.bar, kind);
    }
    acc.value()
}

#[derive(Debug, Clone, Copy)]
struct AnchoredSum {
    anchor_idx: usize,
    last_idx: usize,
    acc: AvwapAccumulator,
}

/// Running AVWAP for the confirmed Low and High anchors.
#[derive(Debug, Clone, Default)]
pub struct AvwapEngine {
    low: Option<AnchoredSum>,
    high: Option<AnchoredSum>,
}

impl AvwapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: AnchorKind) -> &mut Option<AnchoredSum> {
        match kind {
            AnchorKind::Low => &mut self.low,
            AnchorKind::High => &mut self.high,
        }
    }

    /// Restart the sums for `anchor.kind` at the anchor bar and catch up to
    /// `current_idx`.
    ///
    /// An anchor timestamp that is not on the timeline, or a `current_idx`
    /// past its end, leaves that kind undefined; the error is returned for
    /// logging and the run goes on.
    pub fn on_anchor_confirmed(
        &mut self,
        timeline: &MasterTimeline,
        anchor: &Anchor,
        current_idx: usize,
    ) -> Result<(), AnchortraderError> {
        let slot = self.slot(anchor.kind);
        *slot = None;

        let anchor_idx = match timeline.index_of(anchor.timestamp) {
            Some(idx) if idx <= current_idx => idx,
            _ => {
                return Err(AnchortraderError::MisalignedTimestamp {
                    timestamp: anchor.timestamp,
                });
            }
        };

        let Some(window) = timeline.rows().get(anchor_idx..=current_idx) else {
            return Err(AnchortraderError::MisalignedTimestamp {
                timestamp: anchor.timestamp,
            });
        };
        let mut acc = AvwapAccumulator::default();
        for row in window {
            acc.add(&row.bar, anchor.kind);
        }
        *slot = Some(AnchoredSum {
            anchor_idx,
            last_idx: current_idx,
            acc,
        });
        Ok(())
    }

    pub fn invalidate(&mut self, kind: AnchorKind) {
        *self.slot(kind) = None;
    }

    /// Bring every live sum up to and including `current_idx`.
    pub fn advance(&mut self, timeline: &MasterTimeline, current_idx: usize) {
        let rows = timeline.rows();
        for (kind, slot) in [
            (AnchorKind::Low, &mut self.low),
            (AnchorKind::High, &mut self.high),
        ] {
            if let Some(sum) = slot {
                while sum.last_idx < current_idx {
                    sum.last_idx += 1;
                    if let Some(row) = rows.get(sum.last_idx) {
                        sum.acc.add(&row.bar, kind);
                    }
                }
            }
        }
    }

    pub fn value(&self, kind: AnchorKind) -> Option<f64> {
        let sum = match kind {
            AnchorKind::Low => self.low.as_ref(),
            AnchorKind::High => self.high.as_ref(),
        };
        sum.and_then(|s| s.acc.value())
    }

    pub fn anchor_index(&self, kind: AnchorKind) -> Option<usize> {
        match kind {
            AnchorKind::Low => self.low.map(|s| s.anchor_idx),
            AnchorKind::High => self.high.map(|s| s.anchor_idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap()
    }

    fn row(i: i64, low: f64, high: f64, volume: f64) -> MasterRow {
        MasterRow {
            bar: OhlcvBar {
                timestamp: t0() + Duration::minutes(i),
                open: low,
                high,
                low,
                close: high,
                volume,
            },
            trend_k: None,
            short_k: None,
            atr: None,
            adx: None,
        }
    }

    fn anchor_at(i: i64, kind: AnchorKind) -> Anchor {
        Anchor {
            timestamp: t0() + Duration::minutes(i),
            extreme_price: 0.0,
            kind,
        }
    }

    #[test]
    fn three_bar_window_averages_lows() {
        let rows = vec![
            row(0, 10.0, 11.0, 100.0),
            row(1, 12.0, 13.0, 100.0),
            row(2, 14.0, 15.0, 100.0),
        ];
        let v = avwap_over_window(&rows, 0, 2, AnchorKind::Low).unwrap();
        assert_relative_eq!(v, 12.0);
    }

    #[test]
    fn single_bar_window_is_anchor_price() {
        let rows = vec![row(0, 10.0, 11.0, 50.0), row(1, 9.0, 12.0, 70.0)];
        assert_eq!(avwap_over_window(&rows, 1, 1, AnchorKind::Low), Some(9.0));
        assert_eq!(avwap_over_window(&rows, 1, 1, AnchorKind::High), Some(12.0));
    }

    #[test]
    fn undefined_before_anchor_and_on_zero_volume() {
        let rows = vec![row(0, 10.0, 11.0, 0.0), row(1, 9.0, 12.0, 0.0)];
        assert_eq!(avwap_over_window(&rows, 1, 0, AnchorKind::Low), None);
        assert_eq!(avwap_over_window(&rows, 0, 1, AnchorKind::Low), None);
        assert_eq!(avwap_over_window(&rows, 0, 5, AnchorKind::Low), None);
    }

    #[test]
    fn accumulator_weights_high_for_high_anchors() {
        let mut acc = AvwapAccumulator::default();
        assert_eq!(acc.value(), None);
        acc.add(&row(0, 10.0, 11.0, 10.0).bar, AnchorKind::High);
        assert_eq!(acc.value(), Some(11.0));
    }

    #[test]
    fn incremental_matches_full_scan() {
        let rows: Vec<MasterRow> = (0..120)
            .map(|i| {
                let base = 100.0 + ((i * 17) % 23) as f64 * 0.5;
                row(i, base, base + 1.0 + (i % 3) as f64, 10.0 + (i % 7) as f64 * 25.0)
            })
            .collect();
        let timeline = MasterTimeline::new(rows);
        let mut engine = AvwapEngine::new();

        engine
            .on_anchor_confirmed(&timeline, &anchor_at(10, AnchorKind::Low), 15)
            .unwrap();
        for i in 15..60 {
            engine.advance(&timeline, i);
            let full = avwap_over_window(timeline.rows(), 10, i, AnchorKind::Low).unwrap();
            assert_relative_eq!(engine.value(AnchorKind::Low).unwrap(), full, epsilon = 1e-9);
        }

        engine
            .on_anchor_confirmed(&timeline, &anchor_at(40, AnchorKind::Low), 60)
            .unwrap();
        engine
            .on_anchor_confirmed(&timeline, &anchor_at(55, AnchorKind::High), 60)
            .unwrap();
        for i in 60..120 {
            engine.advance(&timeline, i);
            let low = avwap_over_window(timeline.rows(), 40, i, AnchorKind::Low).unwrap();
            let high = avwap_over_window(timeline.rows(), 55, i, AnchorKind::High).unwrap();
            assert_relative_eq!(engine.value(AnchorKind::Low).unwrap(), low, epsilon = 1e-9);
            assert_relative_eq!(engine.value(AnchorKind::High).unwrap(), high, epsilon = 1e-9);
        }
        assert_eq!(engine.anchor_index(AnchorKind::Low), Some(40));
    }

    #[test]
    fn misaligned_anchor_is_undefined() {
        let timeline = MasterTimeline::new(vec![row(0, 10.0, 11.0, 1.0), row(1, 10.0, 11.0, 1.0)]);
        let mut engine = AvwapEngine::new();
        engine
            .on_anchor_confirmed(&timeline, &anchor_at(0, AnchorKind::Low), 1)
            .unwrap();
        assert!(engine.value(AnchorKind::Low).is_some());

        let mut stray = anchor_at(0, AnchorKind::Low);
        stray.timestamp += Duration::seconds(30);
        let err = engine.on_anchor_confirmed(&timeline, &stray, 1).unwrap_err();
        assert!(matches!(err, AnchortraderError::MisalignedTimestamp { .. }));
        assert_eq!(engine.value(AnchorKind::Low), None);
    }

    #[test]
    fn confirmation_past_timeline_end_is_an_error() {
        let timeline = MasterTimeline::new(vec![row(0, 10.0, 11.0, 1.0), row(1, 10.0, 11.0, 1.0)]);
        let mut engine = AvwapEngine::new();
        let err = engine
            .on_anchor_confirmed(&timeline, &anchor_at(0, AnchorKind::High), 5)
            .unwrap_err();
        assert!(matches!(err, AnchortraderError::MisalignedTimestamp { .. }));
        assert_eq!(engine.value(AnchorKind::High), None);
        assert_eq!(engine.anchor_index(AnchorKind::High), None);
    }

    #[test]
    fn invalidate_clears_one_kind() {
        let timeline = MasterTimeline::new(vec![row(0, 10.0, 11.0, 1.0)]);
        let mut engine = AvwapEngine::new();
        engine
            .on_anchor_confirmed(&timeline, &anchor_at(0, AnchorKind::Low), 0)
            .unwrap();
        engine
            .on_anchor_confirmed(&timeline, &anchor_at(0, AnchorKind::High), 0)
            .unwrap();
        engine.invalidate(AnchorKind::Low);
        assert_eq!(engine.value(AnchorKind::Low), None);
        assert_eq!(engine.value(AnchorKind::High), Some(11.0));
    }
}
