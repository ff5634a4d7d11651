/// Process runner
///
/// Executes untrusted code out-of-process under a wall-clock watchdog and
/// an OS-enforced memory ceiling. A crash, infinite loop, or allocation
/// blow-up in the child cannot destabilize the calling process. Both the
/// wait loop and output collection are deadline-bounded, so one run can
/// block its worker for at most the wall-clock limit plus a short
/// collection grace — even when a forked descendant outlives the child
/// and holds the output pipes open.
use crate::config::types::{OutputIntegrity, RawOutcome, Result, SandboxError};
use crate::safety::ExecutionEnvironment;
use crate::utils::output::StreamCollector;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Limits applied to one execution, independent of spawning mechanics.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// Wall-clock limit enforced by the watchdog loop
    pub wall_time: Duration,
    /// Address-space ceiling (RLIMIT_AS) applied in the child before exec
    pub memory_bytes: u64,
}

/// Apply one rlimit with soft == hard. Runs in the forked child before
/// exec; must stay async-signal-safe (no allocation, no locking).
fn apply_rlimit(resource: libc::__rlimit_resource_t, value: u64) -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };
    let rc = unsafe { libc::setrlimit(resource, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Extra time granted to the collectors after a group kill: the write
/// ends are closed by then, so the readers only need to hit EOF and send.
const COLLECTION_GRACE: Duration = Duration::from_millis(500);

/// Drain one collected stream within the run's wall-clock deadline.
///
/// If the stream is still open at the deadline, an orphaned descendant
/// inherited the pipe; kill the whole process group once and give the
/// reader a short grace to reach EOF. A holder that survives even the
/// kill costs only the grace: the reader is abandoned, not joined.
fn drain_stream(
    collector: Option<StreamCollector>,
    deadline: Instant,
    pgid: Pid,
    group_killed: &mut bool,
) -> (Vec<u8>, OutputIntegrity) {
    let mut collector = match collector {
        Some(collector) => collector,
        None => return (Vec::new(), Default::default()),
    };

    let budget = deadline.saturating_duration_since(Instant::now());
    if let Some(result) = collector.wait(budget) {
        return result;
    }

    if !*group_killed {
        log::info!("output stream still open at deadline, killing group {}", pgid);
        if let Err(e) = killpg(pgid, Signal::SIGKILL) {
            // ESRCH here just means every group member is already gone.
            log::debug!("killpg({}): {}", pgid, SandboxError::from(e));
        }
        *group_killed = true;
    }

    match collector.wait(COLLECTION_GRACE) {
        Some((bytes, _)) => (bytes, OutputIntegrity::TruncatedByLimit),
        None => collector.abandon(),
    }
}

/// Spawns the interpreter against a prepared source file and supervises
/// it to completion, timeout, or crash.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    python_path: PathBuf,
    limits: ResourceLimits,
    stdout_limit: usize,
    stderr_limit: usize,
}

impl ProcessRunner {
    pub fn new(
        python_path: PathBuf,
        limits: ResourceLimits,
        stdout_limit: usize,
        stderr_limit: usize,
    ) -> Self {
        Self {
            python_path,
            limits,
            stdout_limit,
            stderr_limit,
        }
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Run the interpreter against `source_file` inside `env`.
    ///
    /// stdin is disconnected (no interactive input reaches the child) and
    /// the working directory is the run directory, so relative writes land
    /// inside the environment. Errors are returned only for infrastructure
    /// failures (spawn/wait); everything the child does wrong is reported
    /// through the outcome.
    pub fn run(&self, source_file: &Path, env: &ExecutionEnvironment) -> Result<RawOutcome> {
        let memory_bytes = self.limits.memory_bytes;
        let mut command = Command::new(&self.python_path);
        command
            .arg("-B") // no .pyc artifacts polluting the workspace
            .arg(source_file)
            .current_dir(env.run_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Limits go on in the child, before user code gets a chance to run.
        // setsid() puts the child in its own process group so the watchdog
        // can kill anything it forks along with it.
        unsafe {
            command.pre_exec(move || {
                if libc::setsid() < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                apply_rlimit(libc::RLIMIT_AS, memory_bytes)?;
                apply_rlimit(libc::RLIMIT_CORE, 0)?;
                Ok(())
            });
        }

        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| SandboxError::Process(format!("spawn({}): {}", self.python_path.display(), e)))?;

        let child_pid = child.id() as i32;

        let stdout_collector = child
            .stdout
            .take()
            .map(|s| StreamCollector::spawn(s, self.stdout_limit));
        let stderr_collector = child
            .stderr
            .take()
            .map(|s| StreamCollector::spawn(s, self.stderr_limit));

        // Watchdog loop: poll, kill the whole group at the wall limit.
        let mut timed_out = false;
        let mut group_killed = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() > self.limits.wall_time {
                        timed_out = true;
                        log::info!(
                            "wall-clock limit exceeded after {:?}, killing pid {}",
                            self.limits.wall_time,
                            child_pid
                        );
                        if let Err(e) = killpg(Pid::from_raw(child_pid), Signal::SIGKILL) {
                            log::warn!("killpg({}): {}", child_pid, SandboxError::from(e));
                            let _ = child.kill();
                        }
                        group_killed = true;
                        break child.wait().map_err(|e| {
                            SandboxError::Process(format!("wait after kill: {}", e))
                        })?;
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(SandboxError::Process(format!("wait: {}", e))),
            }
        };

        // Collection is bounded by the same wall-clock deadline as the
        // child itself: a descendant that inherited the pipes cannot hold
        // the worker past the limit.
        let deadline = started + self.limits.wall_time;
        let pgid = Pid::from_raw(child_pid);
        let (stdout, stdout_integrity) =
            drain_stream(stdout_collector, deadline, pgid, &mut group_killed);
        let (stderr, stderr_integrity) =
            drain_stream(stderr_collector, deadline, pgid, &mut group_killed);
        let wall_time = started.elapsed().as_secs_f64();

        Ok(RawOutcome {
            exit_code: status.code(),
            signal: status.signal(),
            timed_out,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            stdout_integrity,
            stderr_integrity,
            wall_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::ExecutionEnvironment;

    fn runner(wall_secs: u64, memory: u64) -> ProcessRunner {
        ProcessRunner::new(
            PathBuf::from("python3"),
            ResourceLimits {
                wall_time: Duration::from_secs(wall_secs),
                memory_bytes: memory,
            },
            1024 * 1024,
            1024 * 1024,
        )
    }

    fn prepared_env(source: &str) -> (tempfile::TempDir, ExecutionEnvironment, PathBuf) {
        let base = tempfile::tempdir().unwrap();
        let mut env = ExecutionEnvironment::create(base.path()).unwrap();
        let file = env.write_source(source).unwrap();
        (base, env, file)
    }

    #[test]
    fn normal_exit_is_captured() {
        let (_base, env, file) = prepared_env("print(2 + 2)\n");
        let outcome = runner(10, 256 * 1024 * 1024).run(&file, &env).unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout, "4\n");
        assert_eq!(outcome.stderr, "");
        assert!(!outcome.timed_out);
    }

    #[test]
    fn nonzero_exit_passes_through() {
        let (_base, env, file) = prepared_env("raise ValueError('boom')\n");
        let outcome = runner(10, 256 * 1024 * 1024).run(&file, &env).unwrap();

        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.stderr.contains("ValueError"));
        assert!(!outcome.timed_out);
    }

    #[test]
    fn wall_clock_timeout_kills_the_child() {
        let (_base, env, file) = prepared_env("import time\ntime.sleep(30)\n");
        let started = Instant::now();
        let outcome = runner(1, 256 * 1024 * 1024).run(&file, &env).unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        // Bounded by the limit, not the sleep duration
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn stdout_and_stderr_are_separate_streams() {
        let (_base, env, file) = prepared_env(
            "import sys as _s\nprint('to stdout')\nprint('to stderr', file=_s.stderr)\n",
        );
        let outcome = runner(10, 256 * 1024 * 1024).run(&file, &env).unwrap();

        assert_eq!(outcome.stdout, "to stdout\n");
        assert_eq!(outcome.stderr, "to stderr\n");
    }

    #[test]
    fn missing_interpreter_is_a_process_error() {
        let (_base, env, file) = prepared_env("print(1)\n");
        let runner = ProcessRunner::new(
            PathBuf::from("/nonexistent/python3"),
            ResourceLimits {
                wall_time: Duration::from_secs(1),
                memory_bytes: 256 * 1024 * 1024,
            },
            1024,
            1024,
        );
        assert!(matches!(
            runner.run(&file, &env),
            Err(SandboxError::Process(_))
        ));
    }
}
