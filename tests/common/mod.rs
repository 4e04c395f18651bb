#![allow(dead_code)]

use anchortrader::domain::error::AnchortraderError;
use anchortrader::domain::indicator::StochRsiParams;
pub use anchortrader::domain::ohlcv::OhlcvBar;
use anchortrader::domain::signal::StrategyKind;
use anchortrader::domain::strategy::{BiasParams, RiskParams, StrategyParams};
use anchortrader::domain::timeline::MasterRow;
use anchortrader::ports::data_port::DataPort;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::Cell;

pub struct MockDataPort {
    pub bars: Vec<OhlcvBar>,
    pub error: Option<String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            error: None,
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, bars: Vec<OhlcvBar>) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn source_name(&self) -> String {
        "mock".to_string()
    }

    fn fetch_minute_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcvBar>, AnchortraderError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = &self.error {
            return Err(AnchortraderError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .cloned()
            .collect())
    }
}

/// Monday 2025-11-03 00:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap()
}

pub fn minute(i: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(i)
}

pub fn make_bar(ts: DateTime<Utc>, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: ts,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 100.0,
    }
}

/// Deterministic minute bars: a slow multi-day swing with an intraday
/// ripple on top, so both StochRSI lines travel through their extremes.
pub fn wave_minute_bars(count: usize) -> Vec<OhlcvBar> {
    let mut prev_close = 30_000.0;
    (0..count)
        .map(|i| {
            let x = i as f64;
            let slow = 600.0 * (x * std::f64::consts::TAU / 2_880.0).sin();
            let fast = 120.0 * (x * std::f64::consts::TAU / 270.0).sin();
            let close = 30_000.0 + slow + fast;
            let open = prev_close;
            prev_close = close;
            OhlcvBar {
                timestamp: minute(i as i64),
                open,
                high: open.max(close) + 3.0,
                low: open.min(close) - 3.0,
                close,
                volume: 50.0 + (i % 17) as f64 * 10.0,
            }
        })
        .collect()
}

fn stoch(length: usize) -> StochRsiParams {
    StochRsiParams {
        length,
        rsi_length: length,
        k: 2,
        d: 2,
    }
}

/// Short lookbacks so a week of minute bars clears warm-up.
pub fn fast_params() -> StrategyParams {
    StrategyParams {
        strategy: StrategyKind::AvwapTrend,
        bias: BiasParams {
            oversold_level: 20.0,
            overbought_level: 80.0,
            adx_threshold: 10.0,
        },
        trend_stoch_rsi: stoch(5),
        short_stoch_rsi: stoch(5),
        atr_length: 5,
        adx_length: 5,
        risk: RiskParams {
            sl_multiplier: 1.0,
            tp_multiplier: 3.0,
            breakeven_trigger_r: 1.0,
        },
        filters: Vec::new(),
    }
}

pub fn make_row(
    i: i64,
    trend_k: f64,
    short_k: f64,
    low: f64,
    high: f64,
    close: f64,
) -> MasterRow {
    MasterRow {
        bar: OhlcvBar {
            timestamp: minute(i),
            open: close,
            high,
            low,
            close,
            volume: 100.0,
        },
        trend_k: Some(trend_k),
        short_k: Some(short_k),
        atr: Some(2.0),
        adx: Some(30.0),
    }
}

pub const VALID_INI: &str = r#"
[data]
path = data/J225_1m.csv
start = 2025-11-02
end = 2025-11-13
retry_attempts = 2
retry_backoff_ms = 0

[strategy]
kind = avwap_trend

[bias]
oversold_level = 20
overbought_level = 80
adx_threshold = 10

[trend_stoch_rsi]
length = 5
rsi_length = 5
k = 2
d = 2

[short_stoch_rsi]
length = 5
rsi_length = 5
k = 2
d = 2

[indicators]
atr_length = 5
adx_length = 5

[risk]
sl_multiplier = 1.0
tp_multiplier = 3.0
breakeven_trigger_r = 1.0
"#;
