//! Bar-by-bar simulation over the master timeline.
//!
//! Each step runs, in order: anchor tracker, AVWAP update, exits, signal,
//! entries. No entry is taken on a bar that closed a position.

use crate::domain::anchor::{AnchorTracker, Bias, TrackerEvent};
use crate::domain::avwap::AvwapEngine;
use crate::domain::error::AnchortraderError;
use crate::domain::filter::passes_all;
use crate::domain::ledger::TradeLedger;
use crate::domain::position::{ActiveAvwap, Position, PositionManager, Trade};
use crate::domain::signal::SignalEngine;
use crate::domain::strategy::StrategyParams;
use crate::domain::timeline::MasterTimeline;

/// Mutable state carried from one bar to the next.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub tracker: AnchorTracker,
    pub avwap: AvwapEngine,
    pub positions: PositionManager,
    pub signals: SignalEngine,
}

impl SimulationContext {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            tracker: AnchorTracker::new(),
            avwap: AvwapEngine::new(),
            positions: PositionManager::new(params.risk),
            signals: SignalEngine::new(params.strategy),
        }
    }

    /// AVWAP of the active anchor, if it is defined on this bar.
    pub fn active_avwap(&self) -> Option<ActiveAvwap> {
        let anchor = *self.tracker.active_anchor()?;
        let value = self.avwap.value(anchor.kind)?;
        Some(ActiveAvwap { anchor, value })
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub events: Vec<TrackerEvent>,
    pub closed: Option<Trade>,
    pub opened: bool,
}

/// Process the bar at `idx`. `idx` must advance by one per call.
pub fn step(
    ctx: &mut SimulationContext,
    timeline: &MasterTimeline,
    idx: usize,
    params: &StrategyParams,
) -> StepOutcome {
    let Some(row) = timeline.get(idx) else {
        return StepOutcome::default();
    };

    let events = ctx.tracker.update(row, &params.bias);
    for event in &events {
        match event {
            TrackerEvent::AnchorConfirmed(anchor) => {
                if let Err(e) = ctx.avwap.on_anchor_confirmed(timeline, anchor, idx) {
                    tracing::warn!(error = %e, kind = %anchor.kind, "anchor dropped");
                }
            }
            TrackerEvent::AnchorInvalidated(kind) => ctx.avwap.invalidate(*kind),
            TrackerEvent::BiasChanged { .. } => {}
        }
    }
    ctx.avwap.advance(timeline, idx);

    let active = ctx.active_avwap();
    let exit_avwap = active.as_ref().filter(|_| ctx.signals.uses_avwap_exit());
    let closed = ctx.positions.check_exit(&row.bar, exit_avwap);

    // Evaluated on every bar so stateful signals never miss one.
    let signal = ctx.signals.evaluate(row, active.as_ref(), &params.risk);
    let opened = closed.is_none()
        && passes_all(&params.filters, row)
        && signal.is_some_and(|s| ctx.positions.enter(s, row).is_some());

    StepOutcome {
        events,
        closed,
        opened,
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub ledger: TradeLedger,
    /// Bias after each processed bar.
    pub bias_history: Vec<Bias>,
    /// Position still open after the last bar.
    pub open_position: Option<Position>,
    pub bars_processed: usize,
}

/// Fold the whole timeline. Only invalid parameters are an error.
pub fn run_simulation(
    timeline: &MasterTimeline,
    params: &StrategyParams,
) -> Result<SimulationResult, AnchortraderError> {
    params.validate()?;

    let mut ctx = SimulationContext::new(params);
    let mut ledger = TradeLedger::new();
    let mut bias_history = Vec::with_capacity(timeline.len());

    for idx in 0..timeline.len() {
        let outcome = step(&mut ctx, timeline, idx, params);
        if let Some(trade) = outcome.closed {
            ledger.record(trade);
        }
        bias_history.push(ctx.tracker.bias());
    }

    tracing::info!(
        bars = timeline.len(),
        trades = ledger.len(),
        "simulation finished"
    );

    Ok(SimulationResult {
        ledger,
        bias_history,
        open_position: ctx.positions.into_position(),
        bars_processed: timeline.len(),
    })
}
