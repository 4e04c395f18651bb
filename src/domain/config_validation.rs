//! Configuration validation.
//!
//! Reads every strategy setting from a [`ConfigPort`], failing on the first
//! missing or malformed key, then range-checks the result. Nothing here
//! falls back to a default for a strategy value.

use crate::domain::error::AnchortraderError;
use crate::domain::filter::EntryFilter;
use crate::domain::indicator::StochRsiParams;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::signal::{MaCrossParams, StrategyKind};
use crate::domain::strategy::{BiasParams, RiskParams, StrategyParams};
use crate::ports::config_port::ConfigPort;
use chrono::{DateTime, NaiveTime, Utc};
use std::path::PathBuf;
use std::str::FromStr;

pub fn build_strategy_params(config: &dyn ConfigPort) -> Result<StrategyParams, AnchortraderError> {
    let params = StrategyParams {
        strategy: read_strategy_kind(config)?,
        bias: BiasParams {
            oversold_level: require(config, "bias", "oversold_level")?,
            overbought_level: require(config, "bias", "overbought_level")?,
            adx_threshold: require(config, "bias", "adx_threshold")?,
        },
        trend_stoch_rsi: read_stoch(config, "trend_stoch_rsi")?,
        short_stoch_rsi: read_stoch(config, "short_stoch_rsi")?,
        atr_length: require(config, "indicators", "atr_length")?,
        adx_length: require(config, "indicators", "adx_length")?,
        risk: RiskParams {
            sl_multiplier: require(config, "risk", "sl_multiplier")?,
            tp_multiplier: require(config, "risk", "tp_multiplier")?,
            breakeven_trigger_r: require(config, "risk", "breakeven_trigger_r")?,
        },
        filters: read_filters(config)?,
    };
    params.validate()?;
    Ok(params)
}

fn require<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<T, AnchortraderError> {
    optional(config, section, key)?.ok_or_else(|| AnchortraderError::missing(section, key))
}

/// `Ok(None)` for an absent or blank key; unparsable text is invalid.
pub(crate) fn optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, AnchortraderError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AnchortraderError::invalid(section, key, format!("cannot parse '{}'", raw.trim()))
        }),
        _ => Ok(None),
    }
}

fn read_strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, AnchortraderError> {
    let kind: String = require(config, "strategy", "kind")?;
    match kind.as_str() {
        "avwap_trend" => Ok(StrategyKind::AvwapTrend),
        "ma_cross" => Ok(StrategyKind::MaCross(MaCrossParams {
            fast_period: require(config, "strategy", "fast_period")?,
            slow_period: require(config, "strategy", "slow_period")?,
            atr_multiplier: require(config, "strategy", "atr_multiplier")?,
            adx_threshold: require(config, "strategy", "adx_threshold")?,
        })),
        "opening_range" => {
            let raw: String = require(config, "strategy", "open_time")?;
            let open_time = NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| {
                AnchortraderError::invalid(
                    "strategy",
                    "open_time",
                    format!("invalid open_time '{raw}', expected HH:MM"),
                )
            })?;
            Ok(StrategyKind::OpeningRange { open_time })
        }
        other => Err(AnchortraderError::invalid(
            "strategy",
            "kind",
            format!("unknown strategy '{other}', expected avwap_trend, ma_cross or opening_range"),
        )),
    }
}

fn read_stoch(config: &dyn ConfigPort, section: &str) -> Result<StochRsiParams, AnchortraderError> {
    Ok(StochRsiParams {
        length: require(config, section, "length")?,
        rsi_length: require(config, section, "rsi_length")?,
        k: require(config, section, "k")?,
        d: require(config, section, "d")?,
    })
}

fn read_filters(config: &dyn ConfigPort) -> Result<Vec<EntryFilter>, AnchortraderError> {
    let mut filters = Vec::new();
    if let Some(v) = optional(config, "filters", "min_adx")? {
        filters.push(EntryFilter::MinAdx(v));
    }
    if let Some(v) = optional(config, "filters", "max_atr")? {
        filters.push(EntryFilter::MaxAtr(v));
    }
    let start: Option<u32> = optional(config, "filters", "session_start_hour")?;
    let end: Option<u32> = optional(config, "filters", "session_end_hour")?;
    match (start, end) {
        (Some(start_hour), Some(end_hour)) => filters.push(EntryFilter::Session {
            start_hour,
            end_hour,
        }),
        (Some(_), None) => return Err(AnchortraderError::missing("filters", "session_end_hour")),
        (None, Some(_)) => {
            return Err(AnchortraderError::missing("filters", "session_start_hour"));
        }
        (None, None) => {}
    }
    Ok(filters)
}

/// Where the minute bars come from and which slice of them to use.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub path: Option<PathBuf>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

pub fn build_data_settings(config: &dyn ConfigPort) -> Result<DataSettings, AnchortraderError> {
    let path = config
        .get_string("data", "path")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()));
    let start = read_datetime(config, "start")?;
    let end = read_datetime(config, "end")?;

    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Err(AnchortraderError::invalid(
                "data",
                "start",
                "start must be before end",
            ));
        }
    }
    Ok(DataSettings { path, start, end })
}

fn read_datetime(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<DateTime<Utc>>, AnchortraderError> {
    let Some(raw) = config.get_string("data", key).filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let raw = raw.trim();
    parse_timestamp(raw).map(Some).ok_or_else(|| {
        AnchortraderError::invalid(
            "data",
            key,
            format!("invalid {key} '{raw}', expected YYYY-MM-DD or RFC 3339"),
        )
    })
}
