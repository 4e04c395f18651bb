//! Entry filters.
//!
//! A closed set of gates chosen at configuration time. Every configured
//! filter must pass before the position manager may open a trade; exits are
//! never filtered. An undefined input makes a filter fail.

use crate::domain::error::AnchortraderError;
use crate::domain::timeline::MasterRow;
use chrono::Timelike;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryFilter {
    /// 4-hour ADX strictly above the threshold.
    MinAdx(f64),
    /// 45-minute ATR at or below the ceiling.
    MaxAtr(f64),
    /// UTC hour within `[start_hour, end_hour)`; wraps past midnight when
    /// `start_hour > end_hour`.
    Session { start_hour: u32, end_hour: u32 },
}

impl EntryFilter {
    pub fn evaluate(&self, row: &MasterRow) -> bool {
        match *self {
            EntryFilter::MinAdx(threshold) => row.adx.is_some_and(|adx| adx > threshold),
            EntryFilter::MaxAtr(ceiling) => row.atr.is_some_and(|atr| atr <= ceiling),
            EntryFilter::Session {
                start_hour,
                end_hour,
            } => {
                let hour = row.bar.timestamp.hour();
                if start_hour <= end_hour {
                    start_hour <= hour && hour < end_hour
                } else {
                    hour >= start_hour || hour < end_hour
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), AnchortraderError> {
        match *self {
            EntryFilter::MinAdx(v) if !(0.0..=100.0).contains(&v) => Err(
                AnchortraderError::invalid("filters", "min_adx", "min_adx must be between 0 and 100"),
            ),
            EntryFilter::MaxAtr(v) if !(v.is_finite() && v > 0.0) => Err(
                AnchortraderError::invalid("filters", "max_atr", "max_atr must be positive"),
            ),
            EntryFilter::Session {
                start_hour,
                end_hour,
            } if start_hour > 23 || end_hour > 24 || start_hour == end_hour => {
                Err(AnchortraderError::invalid(
                    "filters",
                    "session_start_hour",
                    "session hours must be distinct, start in 0..=23 and end in 0..=24",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// All filters pass (vacuously true for an empty set).
pub fn passes_all(filters: &[EntryFilter], row: &MasterRow) -> bool {
    filters.iter().all(|f| f.evaluate(row))
}

impl fmt::Display for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryFilter::MinAdx(v) => write!(f, "ADX > {}", v),
            EntryFilter::MaxAtr(v) => write!(f, "ATR <= {}", v),
            EntryFilter::Session {
                start_hour,
                end_hour,
            } => write!(f, "SESSION {:02}:00-{:02}:00 UTC", start_hour, end_hour),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{TimeZone, Utc};

    fn row_at(hour: u32, adx: Option<f64>, atr: Option<f64>) -> MasterRow {
        MasterRow {
            bar: OhlcvBar {
                timestamp: Utc.with_ymd_and_hms(2025, 11, 3, hour, 30, 0).unwrap(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            },
            trend_k: None,
            short_k: None,
            atr,
            adx,
        }
    }

    #[test]
    fn min_adx_is_strict_and_rejects_undefined() {
        let f = EntryFilter::MinAdx(25.0);
        assert!(f.evaluate(&row_at(10, Some(25.1), None)));
        assert!(!f.evaluate(&row_at(10, Some(25.0), None)));
        assert!(!f.evaluate(&row_at(10, None, None)));
    }

    #[test]
    fn max_atr_ceiling() {
        let f = EntryFilter::MaxAtr(3.0);
        assert!(f.evaluate(&row_at(10, None, Some(3.0))));
        assert!(!f.evaluate(&row_at(10, None, Some(3.5))));
        assert!(!f.evaluate(&row_at(10, None, None)));
    }

    #[test]
    fn session_window_and_wraparound() {
        let day = EntryFilter::Session {
            start_hour: 8,
            end_hour: 16,
        };
        assert!(day.evaluate(&row_at(8, None, None)));
        assert!(day.evaluate(&row_at(15, None, None)));
        assert!(!day.evaluate(&row_at(16, None, None)));

        let night = EntryFilter::Session {
            start_hour: 22,
            end_hour: 2,
        };
        assert!(night.evaluate(&row_at(23, None, None)));
        assert!(night.evaluate(&row_at(1, None, None)));
        assert!(!night.evaluate(&row_at(12, None, None)));
    }

    #[test]
    fn empty_filter_set_passes() {
        assert!(passes_all(&[], &row_at(3, None, None)));
    }

    #[test]
    fn validation_ranges() {
        assert!(EntryFilter::MinAdx(150.0).validate().is_err());
        assert!(EntryFilter::MaxAtr(0.0).validate().is_err());
        assert!(
            EntryFilter::Session {
                start_hour: 5,
                end_hour: 5
            }
            .validate()
            .is_err()
        );
        assert!(EntryFilter::MinAdx(25.0).validate().is_ok());
    }

    #[test]
    fn display() {
        assert_eq!(EntryFilter::MinAdx(25.0).to_string(), "ADX > 25");
        assert_eq!(
            EntryFilter::Session {
                start_hour: 8,
                end_hour: 16
            }
            .to_string(),
            "SESSION 08:00-16:00 UTC"
        );
    }
}
