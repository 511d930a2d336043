//! appconf: application configuration wizard
//!
//! Collects per-application settings for a cloud project through a
//! multi-step wizard, validates them against recipes and hands a single
//! aggregated payload to the installer.

pub mod cli;
pub mod core;
pub mod schema;
pub mod wizard;
