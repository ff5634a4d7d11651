//! Execution control
//!
//! Out-of-process execution of untrusted source under explicit limits.

pub mod runner;

pub use runner::{ProcessRunner, ResourceLimits};
