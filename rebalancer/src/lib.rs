//! rebalanced-cli: command-line front end for the `rebalanced` optimizer.
//!
//! Reads a portfolio snapshot from JSON and optimizer settings from TOML,
//! runs the tolerance search, prints the per-position plan with a
//! compliance table, and appends an audit trail.

pub mod audit;
pub mod commands;
pub mod config;
pub mod error;
pub mod report;
pub mod snapshot;
