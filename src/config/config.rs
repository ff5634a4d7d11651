use crate::config::types::{Result, SandboxError};
/// Configuration loading from sandbox.json
use crate::filter::DenyRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process-wide sandbox configuration.
///
/// Loaded once at startup, immutable thereafter. Every `Sandbox` holds its
/// own copy; nothing here is shared mutable state.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock limit for one execution
    pub wall_time_limit: Duration,
    /// Memory ceiling in bytes, applied as RLIMIT_AS before exec
    pub memory_limit: u64,
    /// Interpreter used to run submitted source
    pub python_path: PathBuf,
    /// Root directory under which per-run workspaces are created
    pub workspace_root: PathBuf,
    /// Per-stream stdout capture limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr capture limit (bytes)
    pub stderr_limit: usize,
    /// Deny rules; None selects the built-in set
    pub deny_rules: Option<Vec<DenyRule>>,
}

impl SandboxConfig {
    /// Runtime root directory scoped by effective UID.
    /// Prevents root and non-root runs from colliding on a shared temp dir.
    pub fn runtime_root_dir() -> PathBuf {
        let euid = unsafe { libc::geteuid() };
        std::env::temp_dir().join(format!("execbox-uid-{}", euid))
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            wall_time_limit: Duration::from_secs(30),
            memory_limit: 256 * 1024 * 1024, // 256 MiB
            python_path: PathBuf::from("python3"),
            workspace_root: Self::runtime_root_dir(),
            stdout_limit: 8 * 1024 * 1024, // 8 MiB
            stderr_limit: 2 * 1024 * 1024, // 2 MiB
            deny_rules: None,
        }
    }
}

/// On-disk representation of sandbox.json. All fields optional; absent
/// fields fall back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SandboxConfigFile {
    timeout_seconds: Option<u64>,
    memory_limit_mb: Option<u64>,
    python: Option<String>,
    workspace_root: Option<String>,
    stdout_limit_kb: Option<u64>,
    stderr_limit_kb: Option<u64>,
    deny_rules: Option<Vec<DenyRule>>,
}

impl SandboxConfig {
    /// Load configuration from a JSON file, overlaying the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SandboxError::Config(format!("Failed to read config file: {}", e)))?;

        let file: SandboxConfigFile = serde_json::from_str(&content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse config JSON: {}", e)))?;

        let mut config = Self::default();
        if let Some(secs) = file.timeout_seconds {
            if secs == 0 {
                return Err(SandboxError::Config(
                    "timeout_seconds must be non-zero".to_string(),
                ));
            }
            config.wall_time_limit = Duration::from_secs(secs);
        }
        if let Some(mb) = file.memory_limit_mb {
            if mb == 0 {
                return Err(SandboxError::Config(
                    "memory_limit_mb must be non-zero".to_string(),
                ));
            }
            config.memory_limit = mb * 1024 * 1024;
        }
        if let Some(python) = file.python {
            config.python_path = PathBuf::from(python);
        }
        if let Some(root) = file.workspace_root {
            config.workspace_root = PathBuf::from(root);
        }
        if let Some(kb) = file.stdout_limit_kb {
            config.stdout_limit = (kb as usize) * 1024;
        }
        if let Some(kb) = file.stderr_limit_kb {
            config.stderr_limit = (kb as usize) * 1024;
        }
        if let Some(rules) = file.deny_rules {
            if rules.is_empty() {
                return Err(SandboxError::Config(
                    "deny_rules override must not be empty".to_string(),
                ));
            }
            config.deny_rules = Some(rules);
        }

        Ok(config)
    }
}
