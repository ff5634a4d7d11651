//! Verdict classification and result assembly
//!
//! Maps a raw subprocess outcome onto the closed status taxonomy and
//! packages the immutable [`ExecutionResult`]. The assembler always runs:
//! after rejection, after timeout, after a crash. File collection is
//! best-effort; one unreadable file records a sentinel value instead of
//! failing the request.

use crate::config::types::{ExecutionResult, ExecutionStatus, OutputIntegrity, RawOutcome};
use crate::exec::ResourceLimits;
use crate::safety::ExecutionEnvironment;
use std::collections::BTreeMap;
use std::path::Path;

/// Round to millisecond precision for the serialized record.
fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Classify a raw outcome.
///
/// Memory-kill attribution is heuristic: without cgroup accounting the
/// kernel does not label the kill, so a fatal SIGKILL/SIGSEGV under a
/// configured ceiling, or CPython's MemoryError diagnostic with a nonzero
/// exit, is read as a ceiling breach. Timeout wins when both could apply,
/// because the watchdog is the actor that sent the kill.
pub fn classify(outcome: &RawOutcome, limits: &ResourceLimits) -> ExecutionStatus {
    if outcome.timed_out {
        return ExecutionStatus::TimeLimit;
    }
    if outcome.exit_code == Some(0) {
        return ExecutionStatus::Ok;
    }
    if limits.memory_bytes > 0 {
        if matches!(outcome.signal, Some(libc::SIGKILL) | Some(libc::SIGSEGV)) {
            return ExecutionStatus::MemoryLimit;
        }
        if outcome.stderr.contains("MemoryError") {
            return ExecutionStatus::MemoryLimit;
        }
    }
    ExecutionStatus::RuntimeError
}

/// Sentinel used when the process has no exit code (killed).
const KILLED_RETURN_CODE: i32 = -1;

/// Severity order for one stream's integrity marker. Higher loses more.
fn integrity_rank(integrity: OutputIntegrity) -> u8 {
    match integrity {
        OutputIntegrity::Complete => 0,
        OutputIntegrity::TruncatedByProgramClose => 1,
        OutputIntegrity::ReadError => 2,
        OutputIntegrity::TruncatedByLimit => 3,
    }
}

/// Fold the per-stream markers into the single marker the result carries:
/// the worse of the two, so a clean stderr never masks a truncated stdout.
pub fn combine_integrity(stdout: OutputIntegrity, stderr: OutputIntegrity) -> OutputIntegrity {
    if integrity_rank(stderr) > integrity_rank(stdout) {
        stderr
    } else {
        stdout
    }
}

/// Assemble the result for a completed (or killed) run.
///
/// Collects files the executed code produced before the caller releases
/// the environment.
pub fn assemble_run(
    execution_id: &str,
    outcome: RawOutcome,
    limits: &ResourceLimits,
    env: &ExecutionEnvironment,
) -> ExecutionResult {
    let status = classify(&outcome, limits);
    let files = collect_files(env);

    let error = match status {
        ExecutionStatus::TimeLimit => {
            let mut message = format!(
                "Execution timeout: exceeded {} second limit",
                limits.wall_time.as_secs()
            );
            if !outcome.stderr.is_empty() {
                message.push('\n');
                message.push_str(&outcome.stderr);
            }
            message
        }
        ExecutionStatus::MemoryLimit => {
            let mut message = format!(
                "Memory limit exceeded: {} byte ceiling",
                limits.memory_bytes
            );
            if !outcome.stderr.is_empty() {
                message.push('\n');
                message.push_str(&outcome.stderr);
            }
            message
        }
        _ => outcome.stderr.clone(),
    };

    ExecutionResult {
        execution_id: execution_id.to_string(),
        status,
        output: outcome.stdout,
        error,
        execution_time: round_ms(outcome.wall_time),
        files,
        success: status == ExecutionStatus::Ok,
        return_code: outcome.exit_code.unwrap_or(KILLED_RETURN_CODE),
        output_integrity: combine_integrity(outcome.stdout_integrity, outcome.stderr_integrity),
    }
}

/// Assemble a rejection result. No process was spawned, so there is no
/// output, no files, and no elapsed time worth reporting.
pub fn assemble_rejection(execution_id: &str, reason: &str, pattern: &str) -> ExecutionResult {
    ExecutionResult {
        execution_id: execution_id.to_string(),
        status: ExecutionStatus::SecurityViolation,
        output: String::new(),
        error: format!("Dangerous pattern detected: {} ({})", pattern, reason),
        execution_time: 0.0,
        files: BTreeMap::new(),
        success: false,
        return_code: KILLED_RETURN_CODE,
        output_integrity: OutputIntegrity::Complete,
    }
}

/// Assemble an infrastructure-failure result (workspace creation or spawn
/// failed). The caller-facing message stays generic; the specific cause
/// goes to the log, not the untrusted caller.
pub fn assemble_internal_error(execution_id: &str) -> ExecutionResult {
    ExecutionResult {
        execution_id: execution_id.to_string(),
        status: ExecutionStatus::InternalError,
        output: String::new(),
        error: "Execution failed: internal sandbox error".to_string(),
        execution_time: 0.0,
        files: BTreeMap::new(),
        success: false,
        return_code: KILLED_RETURN_CODE,
        output_integrity: OutputIntegrity::Complete,
    }
}

/// Collect files the executed code wrote into its environment.
///
/// Skips the script file itself and anything that is not a regular file.
/// Content is decoded lossily; a read failure becomes a sentinel value for
/// that one file.
fn collect_files(env: &ExecutionEnvironment) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();

    let entries = match std::fs::read_dir(env.run_dir()) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!(
                "Failed to list run directory {}: {}",
                env.run_dir().display(),
                e
            );
            return files;
        }
    };

    let script_name = env
        .source_file()
        .and_then(Path::file_name)
        .map(|n| n.to_os_string());

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        if Some(entry.file_name()) == script_name {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        match std::fs::read(&path) {
            Ok(bytes) => {
                files.insert(name, String::from_utf8_lossy(&bytes).to_string());
            }
            Err(e) => {
                files.insert(name, format!("<error reading file: {}>", e));
            }
        }
    }

    files
}
