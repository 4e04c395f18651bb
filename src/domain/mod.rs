//! Core domain types and logic: the simulation never performs I/O.

pub mod ohlcv;
pub mod resample;
pub mod indicator;
pub mod indicator_helpers;
pub mod timeline;
pub mod anchor;
pub mod avwap;
pub mod position;
pub mod signal;
pub mod filter;
pub mod ledger;
pub mod strategy;
pub mod simulation;
pub mod config_validation;
pub mod error;
