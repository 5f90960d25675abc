//! Auditflow application wiring: configuration and the shared context every
//! CLI command builds its services from.

pub mod config;
pub mod context;

pub use config::{AuditflowConfig, ConfigError};
pub use context::AppContext;
