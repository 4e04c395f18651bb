//! Strategy parameters.
//!
//! Every field is required; the core never substitutes a default. Values
//! are range-checked by [`StrategyParams::validate`] before a run starts.

use crate::domain::error::AnchortraderError;
use crate::domain::filter::EntryFilter;
use crate::domain::indicator::{IndicatorType, StochRsiParams};
use crate::domain::signal::StrategyKind;

/// Thresholds for the 4-hour bias and the 45-minute setup logic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasParams {
    pub oversold_level: f64,
    pub overbought_level: f64,
    pub adx_threshold: f64,
}

/// Exit distances. Target and breakeven trigger are multiples of the
/// entry-to-stop distance (R).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    /// AVWAP entries: stop distance in ATR.
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub breakeven_trigger_r: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub strategy: StrategyKind,
    pub bias: BiasParams,
    /// StochRSI on the 4-hour series.
    pub trend_stoch_rsi: StochRsiParams,
    /// StochRSI on the 45-minute series.
    pub short_stoch_rsi: StochRsiParams,
    /// ATR on the 45-minute series.
    pub atr_length: usize,
    /// ADX on the 4-hour series.
    pub adx_length: usize,
    pub risk: RiskParams,
    pub filters: Vec<EntryFilter>,
}

impl StrategyParams {
    pub fn trend_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::StochRsi(self.trend_stoch_rsi),
            IndicatorType::Adx(self.adx_length),
        ]
    }

    pub fn short_indicators(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::StochRsi(self.short_stoch_rsi),
            IndicatorType::Atr(self.atr_length),
        ]
    }

    pub fn validate(&self) -> Result<(), AnchortraderError> {
        let bias = &self.bias;
        for (key, level) in [
            ("oversold_level", bias.oversold_level),
            ("overbought_level", bias.overbought_level),
            ("adx_threshold", bias.adx_threshold),
        ] {
            if !(0.0..=100.0).contains(&level) {
                return Err(AnchortraderError::invalid(
                    "bias",
                    key,
                    format!("{key} must be between 0 and 100"),
                ));
            }
        }
        if bias.oversold_level >= bias.overbought_level {
            return Err(AnchortraderError::invalid(
                "bias",
                "oversold_level",
                "oversold_level must be below overbought_level",
            ));
        }

        validate_stoch("trend_stoch_rsi", &self.trend_stoch_rsi)?;
        validate_stoch("short_stoch_rsi", &self.short_stoch_rsi)?;

        if self.atr_length == 0 {
            return Err(AnchortraderError::invalid(
                "indicators",
                "atr_length",
                "atr_length must be at least 1",
            ));
        }
        if self.adx_length == 0 {
            return Err(AnchortraderError::invalid(
                "indicators",
                "adx_length",
                "adx_length must be at least 1",
            ));
        }

        let risk = &self.risk;
        for (key, mult) in [
            ("sl_multiplier", risk.sl_multiplier),
            ("tp_multiplier", risk.tp_multiplier),
            ("breakeven_trigger_r", risk.breakeven_trigger_r),
        ] {
            if !(mult.is_finite() && mult > 0.0) {
                return Err(AnchortraderError::invalid(
                    "risk",
                    key,
                    format!("{key} must be positive"),
                ));
            }
        }

        self.strategy.validate()?;
        for filter in &self.filters {
            filter.validate()?;
        }
        Ok(())
    }
}

fn validate_stoch(section: &str, p: &StochRsiParams) -> Result<(), AnchortraderError> {
    for (key, value) in [
        ("length", p.length),
        ("rsi_length", p.rsi_length),
        ("k", p.k),
        ("d", p.d),
    ] {
        if value == 0 {
            return Err(AnchortraderError::invalid(
                section,
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }
    Ok(())
}
