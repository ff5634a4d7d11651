use crate::config::types::{ExecutionRequest, ExecutionStatus};
use crate::config::SandboxConfig;
use crate::sandbox::Sandbox;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to sandbox.json configuration
    #[arg(long, env = "EXECBOX_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute Python source under the sandbox and print the result as JSON
    Run {
        /// Source code as string
        #[arg(long, conflicts_with = "file")]
        code: Option<String>,
        /// Read source from a file ("-" for stdin)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Wall-clock time limit in seconds
        #[arg(long)]
        time: Option<u64>,
        /// Memory limit in MB
        #[arg(long)]
        mem: Option<u64>,
    },
    /// List the active deny rules
    Rules,
}

fn read_source(code: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (code, file) {
        (Some(code), _) => Ok(code),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("reading source from stdin")?;
            Ok(source)
        }
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading source file {}", path.display())),
        (None, None) => anyhow::bail!("provide source via --code or --file"),
    }
}

/// Exit code reflects the verdict so shell callers can branch without
/// parsing JSON: 0=OK, 1=RE, 2=SV, 3=TLE, 4=MLE, 5=IE.
fn exit_code_for(status: ExecutionStatus) -> i32 {
    match status {
        ExecutionStatus::Ok => 0,
        ExecutionStatus::RuntimeError => 1,
        ExecutionStatus::SecurityViolation => 2,
        ExecutionStatus::TimeLimit => 3,
        ExecutionStatus::MemoryLimit => 4,
        ExecutionStatus::InternalError => 5,
    }
}

/// Entry point shared with `src/bin/execbox.rs`.
pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SandboxConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SandboxConfig::default(),
    };

    match cli.command {
        Commands::Run { code, file, time, mem } => {
            if let Some(secs) = time {
                anyhow::ensure!(secs > 0, "--time must be non-zero");
                config.wall_time_limit = std::time::Duration::from_secs(secs);
            }
            if let Some(mb) = mem {
                anyhow::ensure!(mb > 0, "--mem must be non-zero");
                config.memory_limit = mb * 1024 * 1024;
            }

            let source = read_source(code, file)?;
            let sandbox = Sandbox::new(config)?;
            let request = ExecutionRequest::new(source)?;
            let result = sandbox.execute(&request);

            println!("{}", serde_json::to_string_pretty(&result)?);
            std::process::exit(exit_code_for(result.status))
        }
        Commands::Rules => {
            let sandbox = Sandbox::new(config)?;
            for rule in sandbox.filter().rules() {
                println!("{:40} {}", rule.pattern_text(), rule.reason);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_map_to_distinct_exit_codes() {
        let statuses = [
            ExecutionStatus::Ok,
            ExecutionStatus::RuntimeError,
            ExecutionStatus::SecurityViolation,
            ExecutionStatus::TimeLimit,
            ExecutionStatus::MemoryLimit,
            ExecutionStatus::InternalError,
        ];
        let mut codes: Vec<i32> = statuses.iter().map(|s| exit_code_for(*s)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), statuses.len());
    }

    #[test]
    fn source_is_required() {
        assert!(read_source(None, None).is_err());
        assert_eq!(read_source(Some("print(1)".into()), None).unwrap(), "print(1)");
    }
}
