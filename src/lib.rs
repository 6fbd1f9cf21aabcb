//! risklab: portfolio risk and performance analytics.
//!
//! Hexagonal architecture: the analytics engines live in [`domain`], port
//! traits in [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
