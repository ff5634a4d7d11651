/// Per-run execution environments
///
/// Each accepted request gets a fresh, uniquely named directory that is
/// exclusively owned by that request's worker and removed on every exit
/// path. Cleanup is hygiene as well as an invariant: `cleanup` is
/// idempotent, and `Drop` is a backstop for early-return paths.
use crate::config::types::{Result, SandboxError};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Isolated, per-request filesystem scope for one execution attempt.
pub struct ExecutionEnvironment {
    /// Full run UUID; names the run directory
    run_id: String,
    /// Short (8 hex char) form used as the caller-visible execution id
    execution_id: String,
    /// Run-specific directory under the workspace root
    run_dir: PathBuf,
    /// Source file written into the environment (if any)
    source_file: Option<PathBuf>,
}

impl ExecutionEnvironment {
    /// Create a fresh environment under `base`. The directory name is a
    /// new UUID, so concurrent requests can never collide. On failure no
    /// partial state is left behind.
    pub fn create(base: &Path) -> Result<Self> {
        fs::create_dir_all(base).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to create workspace root {}: {}",
                base.display(),
                e
            ))
        })?;

        let run_id = Uuid::new_v4().to_string();
        let execution_id = run_id[..8].to_string();
        let run_dir = base.join(&run_id);

        fs::create_dir(&run_dir).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to create run directory {}: {}",
                run_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            run_id,
            execution_id,
            run_dir,
            source_file: None,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Caller-visible execution identifier (first 8 hex chars of the run UUID).
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Write submitted source into the environment as `script_<id>.py`.
    pub fn write_source(&mut self, source: &str) -> Result<PathBuf> {
        let filename = format!("script_{}.py", self.execution_id);
        let path = self.run_dir.join(&filename);

        fs::write(&path, source).map_err(|e| {
            SandboxError::Workspace(format!(
                "Failed to write source file {}: {}",
                path.display(),
                e
            ))
        })?;

        self.source_file = Some(path.clone());
        Ok(path)
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Remove the run directory and everything the executed code left in
    /// it. Idempotent; safe to call after a partially failed create.
    pub fn cleanup(&self) {
        if self.run_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.run_dir) {
                log::warn!(
                    "Failed to remove run directory {}: {}",
                    self.run_dir.display(),
                    e
                );
            }
        }
    }
}

impl Drop for ExecutionEnvironment {
    fn drop(&mut self) {
        self.cleanup();
    }
}
