//! Command implementations for the scour CLI.

pub mod clean;
pub mod config;
