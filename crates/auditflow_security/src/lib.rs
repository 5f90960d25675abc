//! Auditflow Security Module
//!
//! Provides:
//! - **Containment**: the single resolve-and-contain check used wherever a
//!   relative path from a manifest or directory listing becomes a real path
//! - **Filenames**: upload-name sanitization and header-safe download names
//! - **Signing**: SHA256 hashing for staged file identity

pub mod containment;
pub mod filename;
pub mod signing;

pub use containment::{is_safe_relative, is_strictly_within, resolve_contained, ContainmentError};
pub use filename::{header_safe_filename, sanitize_upload_name, split_extension};
pub use signing::StreamingDigest;
