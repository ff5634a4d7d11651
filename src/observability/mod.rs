//! Observability
//!
//! Structured audit events for operator visibility.

pub mod audit;
