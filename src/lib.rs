//! rltrader: indicator features, a trading simulation environment and a
//! risk-gated order path for daily equities.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
#[cfg(feature = "sqlite")]
pub mod cli;
pub mod domain;
pub mod ports;
