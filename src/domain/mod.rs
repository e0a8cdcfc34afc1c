//! Core domain types and logic.

pub mod account;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod observation;
pub mod ohlcv;
pub mod order;
pub mod risk;
pub mod simulation;
pub mod split;
pub mod trading;
