//! execbox: bounded execution of untrusted Python snippets
//!
//! Accepts untrusted source text, rejects known-dangerous constructs via a
//! static deny-pattern scan, then runs the code in a time- and
//! memory-bounded subprocess inside a per-run workspace and packages the
//! captured output into an immutable result record.
//!
//! # Architecture
//!
//! The pipeline runs four stages sequentially per request:
//!
//! ## Pattern filter ([`filter`])
//! - [`filter::PatternFilter`]: deny-list scan, first match rejects
//! - [`filter::rules`]: rule model and the built-in deny set
//!
//! ## Execution environment ([`safety`])
//! - [`safety::workspace`]: uniquely named per-run directory, idempotent
//!   cleanup on every exit path
//!
//! ## Process runner ([`exec`])
//! - [`exec::runner`]: out-of-process interpreter launch with pre-exec
//!   rlimits (memory ceiling) and a wall-clock watchdog
//!
//! ## Verdict & assembly ([`verdict`])
//! - status classification (OK/TLE/MLE/RE/SV/IE) and result packaging,
//!   including best-effort collection of files the code produced
//!
//! ## Supporting modules
//! - [`config`]: process-wide settings, loaded once and immutable
//! - [`observability::audit`]: structured JSON audit events
//! - [`utils::output`]: bounded per-stream output collection
//! - [`cli`]: `execbox` binary entrypoint wiring
//!
//! # Design principles
//!
//! 1. **The filter is advisory** - substring/regex rejection is a fast
//!    heuristic, not a security boundary; the rlimit layer sits beneath it
//!    and real isolation must be layered below both
//! 2. **Out-of-process always** - untrusted code never runs in the serving
//!    process; a crash or spin loop costs at most one bounded wait
//! 3. **Cleanup on every path** - one request, one workspace, gone before
//!    the result is returned
//! 4. **Errors are results** - nothing a submitted program does propagates
//!    as an unhandled failure to the caller

// Pattern filter
pub mod filter;

// Execution control
pub mod exec;

// Safety & cleanup
pub mod safety;

// Verdict & result assembly
pub mod verdict;

// Pipeline
pub mod sandbox;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the execbox binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, OutputIntegrity, RawOutcome, Result,
    SandboxError,
};
pub use config::SandboxConfig;
pub use filter::{DenyRule, FilterDecision, PatternFilter};
pub use sandbox::Sandbox;
