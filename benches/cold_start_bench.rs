// Cold-start benchmark for the execbox CLI
// Measures end-to-end latency from invocation to verdict for a trivial
// payload. Python startup dominates; budget: p50 < 150ms, p95 < 300ms.

use std::process::Command;
use std::time::{Duration, Instant};

const ITERATIONS: usize = 100;
const WARMUP_ITERATIONS: usize = 10;

struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = (len as f64 * 0.95) as usize;
        let p99_idx = (len as f64 * 0.99) as usize;

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            p99: samples[p99_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self, label: &str) {
        println!("\n{}", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

fn run_once(code: &str) -> Duration {
    let start = Instant::now();
    let _ = Command::new("execbox")
        .arg("run")
        .arg("--code")
        .arg(code)
        .output();
    start.elapsed()
}

fn main() {
    println!("=== execbox cold-start benchmark ===");
    println!(
        "Iterations: {} (after {} warmup)",
        ITERATIONS, WARMUP_ITERATIONS
    );

    let code = r#"print("Hello, World!")"#;

    for _ in 0..WARMUP_ITERATIONS {
        let _ = run_once(code);
    }

    let mut samples = Vec::with_capacity(ITERATIONS);
    for _ in 0..ITERATIONS {
        samples.push(run_once(code));
    }

    let stats = LatencyStats::from_samples(samples);
    stats.print("Python hello world");

    let passed = stats.p50 < Duration::from_millis(150) && stats.p95 < Duration::from_millis(300);
    if passed {
        println!("\nPASS: cold-start budget met");
        std::process::exit(0);
    } else {
        println!(
            "\nFAIL: p50={:?} (target <150ms), p95={:?} (target <300ms)",
            stats.p50, stats.p95
        );
        std::process::exit(1);
    }
}
