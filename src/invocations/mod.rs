//! Type-safe invocation modules.
//!
//! Each struct here implements `ToolArgs` for one delegated command and maps
//! its fields to the exact arguments the tool expects.

pub mod database;
pub mod deploy;
pub mod packages;
pub mod services;

/// Mask a secret for display.
pub(crate) const REDACTED: &str = "****";
