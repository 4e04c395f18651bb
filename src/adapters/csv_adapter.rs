//! CSV file data adapter and trade-log writer.
//!
//! Input columns: `timestamp,open,high,low,close,volume`, with `datetime`
//! accepted for the first. Timestamps are RFC 3339, `%Y-%m-%d %H:%M:%S`
//! with an optional `+HH:MM` offset, or naive and read as UTC.

use crate::domain::error::AnchortraderError;
use crate::domain::ohlcv::{OhlcvBar, parse_timestamp};
use crate::domain::position::Trade;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "datetime")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn data_error(&self, reason: impl std::fmt::Display) -> AnchortraderError {
        AnchortraderError::DataSource {
            reason: format!("{}: {}", self.path.display(), reason),
        }
    }
}

impl DataPort for CsvAdapter {
    fn source_name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch_minute_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcvBar>, AnchortraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| self.data_error(e))?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<BarRecord>().enumerate() {
            let record = result.map_err(|e| self.data_error(format!("CSV parse error: {e}")))?;
            let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| {
                self.data_error(format!(
                    "invalid timestamp '{}' on row {}",
                    record.timestamp,
                    line + 1
                ))
            })?;

            if start.is_some_and(|s| timestamp < s) || end.is_some_and(|e| timestamp > e) {
                continue;
            }

            bars.push(OhlcvBar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }

        tracing::debug!(path = %self.path.display(), bars = bars.len(), "read minute bars");
        Ok(bars)
    }
}

#[derive(Debug, Serialize)]
struct TradeRecord {
    #[serde(rename = "Type")]
    direction: String,
    #[serde(rename = "EntryTime")]
    entry_time: String,
    #[serde(rename = "ExitTime")]
    exit_time: String,
    #[serde(rename = "EntryPrice")]
    entry_price: f64,
    #[serde(rename = "ExitPrice")]
    exit_price: f64,
    #[serde(rename = "StopLoss")]
    stop_loss: f64,
    #[serde(rename = "TakeProfit")]
    take_profit: f64,
    #[serde(rename = "AnchorTime")]
    anchor_time: Option<String>,
    #[serde(rename = "AVWAPType")]
    avwap_type: Option<String>,
    #[serde(rename = "EntryAVWAP")]
    entry_avwap: Option<f64>,
    #[serde(rename = "EntryTrendSRSI_K")]
    trend_k: Option<f64>,
    #[serde(rename = "EntryShortSRSI_K")]
    short_k: Option<f64>,
    #[serde(rename = "EntryADX")]
    adx: Option<f64>,
    #[serde(rename = "EntryATR")]
    atr: Option<f64>,
    #[serde(rename = "ExitReason")]
    exit_reason: String,
    #[serde(rename = "PnL")]
    pnl: f64,
}

impl From<&Trade> for TradeRecord {
    fn from(t: &Trade) -> Self {
        Self {
            direction: t.direction.to_string(),
            entry_time: t.entry_timestamp.to_rfc3339(),
            exit_time: t.exit_timestamp.to_rfc3339(),
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            stop_loss: t.stop_loss,
            take_profit: t.take_profit,
            anchor_time: t.anchor.map(|a| a.timestamp.to_rfc3339()),
            avwap_type: t.anchor.map(|a| a.kind.to_string()),
            entry_avwap: t.entry_context.avwap,
            trend_k: t.entry_context.trend_k,
            short_k: t.entry_context.short_k,
            adx: t.entry_context.adx,
            atr: t.entry_context.atr,
            exit_reason: t.exit_reason.to_string(),
            pnl: t.pnl,
        }
    }
}

/// Serialize trades as CSV to any writer, header first.
pub fn write_trades<W: Write>(writer: W, trades: &[Trade]) -> Result<(), AnchortraderError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for trade in trades {
        wtr.serialize(TradeRecord::from(trade))
            .map_err(|e| std::io::Error::other(e.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trade_log(path: &Path, trades: &[Trade]) -> Result<(), AnchortraderError> {
    let file = std::fs::File::create(path)?;
    write_trades(file, trades)?;
    tracing::info!(path = %path.display(), trades = trades.len(), "trade log written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::anchor::{Anchor, AnchorKind};
    use crate::domain::position::{Direction, ExitReason, IndicatorSnapshot};
    use chrono::{Duration, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data_1m.csv");

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2025-11-03 09:01:00,100.0,101.0,99.5,100.5,120\n\
            2025-11-03T09:02:00Z,100.5,102.0,100.0,101.5,80.5\n\
            2025-11-03 09:03:00, 101.5, 101.8, 100.9, 101.0, 60\n";
        fs::write(&path, csv_content).unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_minute_bars_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_minute_bars(None, None).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2025, 11, 3, 9, 1, 0).unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 101.0);
        assert_eq!(bars[0].low, 99.5);
        assert_eq!(bars[0].close, 100.5);
        assert_eq!(bars[0].volume, 120.0);
        assert_eq!(bars[1].volume, 80.5);
        assert_eq!(bars[2].high, 101.8);
    }

    #[test]
    fn fetch_minute_bars_filters_by_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let t = |m| Utc.with_ymd_and_hms(2025, 11, 3, 9, m, 0).unwrap();

        let bars = adapter.fetch_minute_bars(Some(t(2)), Some(t(2))).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, t(2));

        let range = adapter.get_data_range().unwrap().unwrap();
        assert_eq!(range, (t(1), t(3), 3));
    }

    #[test]
    fn datetime_header_with_offsets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("J225_1m.csv");
        fs::write(
            &path,
            "datetime,open,high,low,close,volume\n\
             2025-11-03 09:01:00+00:00,100.0,101.0,99.5,100.5,120\n\
             2025-11-03 18:02:00+09:00,100.5,102.0,100.0,101.5,80\n",
        )
        .unwrap();

        let bars = CsvAdapter::new(path).fetch_minute_bars(None, None).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2025, 11, 3, 9, 1, 0).unwrap()
        );
        assert_eq!(
            bars[1].timestamp,
            Utc.with_ymd_and_hms(2025, 11, 3, 9, 2, 0).unwrap()
        );
        assert_eq!(bars[1].close, 101.5);
    }

    #[test]
    fn missing_file_is_data_source_error() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/data_1m.csv"));
        let err = adapter.fetch_minute_bars(None, None).unwrap_err();
        assert!(matches!(err, AnchortraderError::DataSource { .. }));
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n").unwrap();
        let err = CsvAdapter::new(path).fetch_minute_bars(None, None).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn trade_log_has_header_and_rows() {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let trade = Trade {
            direction: Direction::Short,
            entry_timestamp: t0,
            exit_timestamp: t0 + Duration::minutes(15),
            entry_price: 100.0,
            exit_price: 90.0,
            stop_loss: 100.0,
            take_profit: 90.0,
            anchor: Some(Anchor {
                timestamp: t0 - Duration::minutes(40),
                extreme_price: 104.0,
                kind: AnchorKind::High,
            }),
            entry_context: IndicatorSnapshot {
                avwap: Some(100.0),
                trend_k: Some(75.0),
                short_k: Some(79.0),
                atr: Some(2.0),
                adx: None,
            },
            exit_reason: ExitReason::TakeProfit,
            pnl: 10.0,
        };

        let mut out = Vec::new();
        write_trades(&mut out, &[trade]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Type,EntryTime,ExitTime,EntryPrice,ExitPrice,StopLoss,TakeProfit,AnchorTime,AVWAPType,\
             EntryAVWAP,EntryTrendSRSI_K,EntryShortSRSI_K,EntryADX,EntryATR,ExitReason,PnL"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("Short,2025-11-03T09:00:00+00:00,"));
        assert!(row.ends_with(",high,100.0,75.0,79.0,,2.0,TakeProfit,10.0"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn trade_without_anchor_leaves_anchor_columns_empty() {
        let t0 = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let trade = Trade {
            direction: Direction::Long,
            entry_timestamp: t0,
            exit_timestamp: t0 + Duration::minutes(5),
            entry_price: 100.0,
            exit_price: 97.0,
            stop_loss: 97.0,
            take_profit: 115.0,
            anchor: None,
            entry_context: IndicatorSnapshot::default(),
            exit_reason: ExitReason::StopLoss,
            pnl: -3.0,
        };

        let mut out = Vec::new();
        write_trades(&mut out, &[trade]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.ends_with(",97.0,115.0,,,,,,,,StopLoss,-3.0"));
    }

    #[test]
    fn write_trade_log_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        write_trade_log(&path, &[]).unwrap();
        assert!(path.exists());
    }
}
