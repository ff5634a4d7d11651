//! Safety & cleanup
//!
//! Run-scoped artifact isolation with deterministic cleanup on every exit
//! path.

pub mod workspace;

pub use workspace::ExecutionEnvironment;
