//! Core domain types and analytics engines.

pub mod analytics;
pub mod beta;
pub mod config_validation;
pub mod error;
pub mod factors;
pub mod metrics;
pub mod portfolio;
pub mod price_panel;
pub mod returns;
pub mod stats;
pub mod var;
pub mod volatility;
