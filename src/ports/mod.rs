//! Port traits for external collaborators.

pub mod audit_port;
pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod policy_port;
pub mod settings_port;
