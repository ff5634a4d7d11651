/// Core types and structures for the execbox system
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A single accepted execution request.
///
/// Invariant: the source text is never mutated after acceptance; every
/// downstream stage sees exactly the bytes the caller submitted.
#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    source: String,
}

impl ExecutionRequest {
    /// Accept a request. Empty (or whitespace-only) source is rejected
    /// before any pipeline stage runs.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(SandboxError::Config("empty source".to_string()));
        }
        Ok(Self { source })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Status of one execution - closed taxonomy
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Process completed successfully (exit code 0, no violations)
    #[serde(rename = "OK")]
    Ok,
    /// Wall-clock time limit exceeded, process forcibly terminated
    #[serde(rename = "TLE")]
    TimeLimit,
    /// Memory ceiling exceeded (rlimit kill or allocator failure)
    #[serde(rename = "MLE")]
    MemoryLimit,
    /// Runtime error intrinsic to the submitted code (non-zero exit)
    #[serde(rename = "RE")]
    RuntimeError,
    /// Source matched a deny rule; no process was spawned
    #[serde(rename = "SV")]
    SecurityViolation,
    /// Infrastructure failure (workspace creation, spawn failure)
    #[serde(rename = "IE")]
    InternalError,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        ExecutionStatus::Ok
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ExecutionStatus::Ok => "OK",
            ExecutionStatus::TimeLimit => "TLE",
            ExecutionStatus::MemoryLimit => "MLE",
            ExecutionStatus::RuntimeError => "RE",
            ExecutionStatus::SecurityViolation => "SV",
            ExecutionStatus::InternalError => "IE",
        };
        write!(f, "{}", code)
    }
}

/// Output stream integrity classification
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputIntegrity {
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "truncated_by_limit")]
    TruncatedByLimit,
    #[serde(rename = "truncated_by_program_close")]
    TruncatedByProgramClose,
    #[serde(rename = "read_error")]
    ReadError,
}

impl Default for OutputIntegrity {
    fn default() -> Self {
        OutputIntegrity::Complete
    }
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByLimit => write!(f, "truncated_by_limit"),
            OutputIntegrity::TruncatedByProgramClose => write!(f, "truncated_by_program_close"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
        }
    }
}

/// Raw outcome of one subprocess run, before verdict classification.
///
/// Produced by the process runner, consumed by the assembler. Carries
/// kernel-reported facts only; no interpretation happens here.
#[derive(Clone, Debug, Default)]
pub struct RawOutcome {
    /// Exit code (if normal exit)
    pub exit_code: Option<i32>,
    /// Terminating signal (if signaled)
    pub signal: Option<i32>,
    /// Whether the watchdog killed the process at the wall limit
    pub timed_out: bool,
    /// Captured stdout (partial on timeout/kill)
    pub stdout: String,
    /// Captured stderr (partial on timeout/kill)
    pub stderr: String,
    /// Stream integrity markers from the collectors
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
    /// Wall-clock time used (seconds)
    pub wall_time: f64,
}

/// The immutable outcome record returned to the caller for one request.
///
/// Created exactly once per request by the result assembler; never
/// persisted, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Unique per-request identifier used for correlation and logging
    pub execution_id: String,
    /// Execution status (closed taxonomy)
    pub status: ExecutionStatus,
    /// Captured stdout
    pub output: String,
    /// Rejection reason, timeout/limit diagnostic, or the program's stderr
    pub error: String,
    /// Wall-clock duration in seconds, millisecond precision
    pub execution_time: f64,
    /// Files the executed code produced in its workspace (name -> content)
    pub files: BTreeMap<String, String>,
    /// True iff exit code 0, no timeout, no resource-limit kill
    pub success: bool,
    /// Process exit code; -1 sentinel when the process was killed
    pub return_code: i32,
    /// Combined stream integrity: worst marker across stdout and stderr
    #[serde(default)]
    pub output_integrity: OutputIntegrity,
}

/// Custom error types for execbox
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Resource limit error: {0}")]
    ResourceLimit(String),

    #[error("Deny rule error: {0}")]
    DenyRule(String),
}

impl From<nix::errno::Errno> for SandboxError {
    fn from(err: nix::errno::Errno) -> Self {
        SandboxError::Process(err.to_string())
    }
}

/// Result type alias for execbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_rejected_at_acceptance() {
        assert!(ExecutionRequest::new("").is_err());
        assert!(ExecutionRequest::new("   \n\t").is_err());
        assert!(ExecutionRequest::new("print(1)").is_ok());
    }

    #[test]
    fn status_serializes_to_short_codes() {
        let json = serde_json::to_string(&ExecutionStatus::TimeLimit).unwrap();
        assert_eq!(json, "\"TLE\"");
        let json = serde_json::to_string(&ExecutionStatus::SecurityViolation).unwrap();
        assert_eq!(json, "\"SV\"");
    }

    #[test]
    fn result_round_trips_through_json() {
        let result = ExecutionResult {
            execution_id: "deadbeef".to_string(),
            status: ExecutionStatus::Ok,
            output: "4\n".to_string(),
            error: String::new(),
            execution_time: 0.042,
            files: BTreeMap::new(),
            success: true,
            return_code: 0,
            output_integrity: OutputIntegrity::TruncatedByLimit,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id, "deadbeef");
        assert_eq!(back.status, ExecutionStatus::Ok);
        assert!(back.success);
        assert_eq!(back.output_integrity, OutputIntegrity::TruncatedByLimit);
    }

    #[test]
    fn errno_converts_to_a_process_error() {
        let err = SandboxError::from(nix::errno::Errno::ESRCH);
        assert!(matches!(err, SandboxError::Process(_)));
        assert!(err.to_string().contains("Process error"));
    }
}
