//! Execution pipeline
//!
//! Wires the four stages sequentially for one request:
//! filter (reject fast) -> environment (scoped resource) -> runner
//! (bounded subprocess) -> assembler (always runs). Every exit path
//! releases the environment and yields a well-formed result; nothing a
//! submitted program does propagates as an error to the caller.

use crate::config::types::{ExecutionRequest, ExecutionResult, ExecutionStatus, Result};
use crate::config::SandboxConfig;
use crate::exec::{ProcessRunner, ResourceLimits};
use crate::filter::{FilterDecision, PatternFilter};
use crate::observability::audit::events;
use crate::safety::ExecutionEnvironment;
use crate::verdict;
use uuid::Uuid;

/// One configured sandbox. Holds only immutable state, so a single
/// instance can serve concurrent requests from independent workers.
pub struct Sandbox {
    config: SandboxConfig,
    filter: PatternFilter,
    runner: ProcessRunner,
}

impl Sandbox {
    /// Build a sandbox from configuration. Deny rules come from the config
    /// when present, otherwise the built-in set; a bad regex rule fails
    /// here, at startup.
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let filter = match &config.deny_rules {
            Some(rules) => PatternFilter::new(rules.clone())?,
            None => PatternFilter::with_defaults(),
        };
        Ok(Self::with_filter(config, filter))
    }

    /// Build with an explicitly injected filter (used by tests to
    /// substitute rule sets).
    pub fn with_filter(config: SandboxConfig, filter: PatternFilter) -> Self {
        let runner = ProcessRunner::new(
            config.python_path.clone(),
            ResourceLimits {
                wall_time: config.wall_time_limit,
                memory_bytes: config.memory_limit,
            },
            config.stdout_limit,
            config.stderr_limit,
        );
        Self {
            config,
            filter,
            runner,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn filter(&self) -> &PatternFilter {
        &self.filter
    }

    /// Execute one request to completion, timeout, or rejection.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// result record. Blocks for at most the configured wall-clock limit
    /// plus pipeline overhead.
    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        // The execution id exists before any environment does, so even a
        // rejection or workspace failure is correlatable in the logs.
        let run_uuid = Uuid::new_v4().to_string();
        let execution_id = run_uuid[..8].to_string();

        if let FilterDecision::Reject { reason, pattern } = self.filter.check(request.source()) {
            events::filter_rejection(&execution_id, &pattern, &reason);
            return verdict::assemble_rejection(&execution_id, &reason, &pattern);
        }

        let mut env = match ExecutionEnvironment::create(&self.config.workspace_root) {
            Ok(env) => env,
            Err(e) => {
                log::error!("workspace creation failed: {}", e);
                events::environment_failure(&execution_id, &e.to_string());
                return verdict::assemble_internal_error(&execution_id);
            }
        };
        // The environment owns the real run id; prefer its short form so
        // the script filename and the result id agree.
        let execution_id = env.execution_id().to_string();

        let source_file = match env.write_source(request.source()) {
            Ok(path) => path,
            Err(e) => {
                log::error!("source write failed: {}", e);
                events::environment_failure(&execution_id, &e.to_string());
                env.cleanup();
                return verdict::assemble_internal_error(&execution_id);
            }
        };

        events::execution_start(&execution_id);
        let outcome = match self.runner.run(&source_file, &env) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("runner failed for {}: {}", execution_id, e);
                events::environment_failure(&execution_id, &e.to_string());
                env.cleanup();
                return verdict::assemble_internal_error(&execution_id);
            }
        };

        let result = verdict::assemble_run(&execution_id, outcome, &self.runner.limits(), &env);
        env.cleanup();

        match result.status {
            ExecutionStatus::TimeLimit | ExecutionStatus::MemoryLimit => {
                events::limit_violation(&execution_id, result.status)
            }
            _ => {}
        }
        events::execution_end(&execution_id, result.status, result.execution_time);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DenyRule;
    use std::time::Duration;

    fn test_config(root: &std::path::Path) -> SandboxConfig {
        SandboxConfig {
            workspace_root: root.to_path_buf(),
            ..SandboxConfig::default()
        }
    }

    #[test]
    fn rejection_spawns_nothing_and_creates_no_environment() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(test_config(root.path())).unwrap();

        let request = ExecutionRequest::new("import os\n").unwrap();
        let result = sandbox.execute(&request);

        assert_eq!(result.status, ExecutionStatus::SecurityViolation);
        assert!(!result.success);
        assert!(result.error.contains("import os"));
        // No environment artifact may exist for a rejected request.
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn environment_is_gone_after_successful_run() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(test_config(root.path())).unwrap();

        let request = ExecutionRequest::new("print(2 + 2)\n").unwrap();
        let result = sandbox.execute(&request);

        assert!(result.success, "unexpected failure: {}", result.error);
        assert_eq!(result.output, "4\n");
        assert_eq!(result.return_code, 0);
        assert_eq!(result.error, "");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn environment_is_gone_after_runtime_fault() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(test_config(root.path())).unwrap();

        let request = ExecutionRequest::new("raise RuntimeError('user bug')\n").unwrap();
        let result = sandbox.execute(&request);

        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(!result.success);
        assert_eq!(result.return_code, 1);
        assert!(result.error.contains("user bug"));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn substituted_rule_set_is_honored() {
        let root = tempfile::tempdir().unwrap();
        let filter =
            PatternFilter::new(vec![DenyRule::literal("while true", "spin loop")]).unwrap();
        let sandbox = Sandbox::with_filter(test_config(root.path()), filter);

        // Denied under the injected set even though defaults allow it
        let request = ExecutionRequest::new("while True:\n    pass\n").unwrap();
        let result = sandbox.execute(&request);
        assert_eq!(result.status, ExecutionStatus::SecurityViolation);

        // Allowed under the injected set even though defaults deny it
        let request = ExecutionRequest::new("print('import os is just text here')\n").unwrap();
        let result = sandbox.execute(&request);
        assert!(result.success, "unexpected failure: {}", result.error);
    }

    #[test]
    fn produced_files_are_returned_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(test_config(root.path())).unwrap();

        // pathlib write avoids the denied open( pattern
        let source = "import pathlib\npathlib.Path('out.txt').write_text('made it\\n')\n";
        let request = ExecutionRequest::new(source).unwrap();
        let result = sandbox.execute(&request);

        assert!(result.success, "unexpected failure: {}", result.error);
        assert_eq!(result.files.get("out.txt").unwrap(), "made it\n");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn timeout_is_bounded_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.wall_time_limit = Duration::from_secs(1);
        let sandbox = Sandbox::new(config).unwrap();

        let request =
            ExecutionRequest::new("import time\nprint('before', flush=True)\ntime.sleep(30)\n")
                .unwrap();
        let started = std::time::Instant::now();
        let result = sandbox.execute(&request);

        assert_eq!(result.status, ExecutionStatus::TimeLimit);
        assert!(!result.success);
        assert_eq!(result.return_code, -1);
        assert!(result.error.contains("timeout"));
        // Partial stdout written before the kill is preserved
        assert_eq!(result.output, "before\n");
        // Duration tracks the limit, not the sleep
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(result.execution_time >= 1.0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn resubmission_changes_id_but_not_outcome() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(test_config(root.path())).unwrap();

        let request = ExecutionRequest::new("print('stable')\n").unwrap();
        let first = sandbox.execute(&request);
        let second = sandbox.execute(&request);

        assert_ne!(first.execution_id, second.execution_id);
        assert_eq!(first.output, second.output);
        assert_eq!(first.success, second.success);
        assert_eq!(first.return_code, second.return_code);
    }
}
