//! Command implementations for the `auditflow` binary.

pub mod artifact;
pub mod case_managers;
pub mod config;
pub mod error;
pub mod output;
pub mod run;
pub mod runs;
pub mod stage;
