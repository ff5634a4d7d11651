//! Configuration
//!
//! Process-wide settings: limits, interpreter, workspace root, deny rules.
//! Loaded once at startup, immutable thereafter.

pub mod config;
pub mod types;

pub use config::SandboxConfig;
