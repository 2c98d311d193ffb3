//! chunkrun CLI - run and compare static, dynamic and guided schedules.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chunkrun_core::{chunks_for, chunks_static, problem_size, PolicyKind, SchedulePolicy};
use chunkrun_executor::{RunReport, Scheduler, SchedulerConfig};

mod json_output;
mod workload;

use json_output::JsonEventType;
use workload::Workload;

/// chunkrun - OpenMP-style loop scheduling over a worker pool
#[derive(Parser)]
#[command(name = "chunkrun")]
#[command(about = "Partition a loop into chunks and run them on a worker pool", long_about = None)]
struct Cli {
    /// Emit results as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Log chunk-level detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one schedule and print its execution trace
    Run {
        #[command(flatten)]
        schedule: ScheduleArgs,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Print the chunk plan without executing it
    Chunks {
        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Run static, dynamic and guided on the same workload
    Compare {
        #[command(flatten)]
        shape: ShapeArgs,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Time an even static split across several worker counts
    Bench {
        /// Problem size
        #[arg(long, default_value_t = 1_000_000, allow_negative_numbers = true)]
        n: i64,

        /// Worker counts to try; the first one is the speedup baseline
        #[arg(long, value_delimiter = ',', default_value = "1,2,4,8")]
        workers: Vec<usize>,

        #[command(flatten)]
        exec: ExecArgs,
    },
}

#[derive(Args)]
struct ShapeArgs {
    /// Problem size (iterations 0..n)
    #[arg(long, default_value_t = 32, allow_negative_numbers = true)]
    n: i64,

    /// Chunk size (minimum chunk size for guided)
    #[arg(long, default_value_t = 4)]
    chunk: usize,

    /// Worker count
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Args)]
struct ScheduleArgs {
    /// Scheduling policy: static, dynamic or guided
    #[arg(long, default_value = "static")]
    schedule: String,

    #[command(flatten)]
    shape: ShapeArgs,
}

#[derive(Args)]
struct ExecArgs {
    /// What each chunk computes
    #[arg(long, value_enum, default_value_t = Workload::Sum)]
    workload: Workload,

    /// Sleep up to this many milliseconds per chunk to make costs uneven
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    /// Abort a run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl ShapeArgs {
    fn workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| SchedulerConfig::default().num_workers.min(4))
    }
}

impl ScheduleArgs {
    fn policy(&self) -> Result<SchedulePolicy, Box<dyn std::error::Error>> {
        let kind: PolicyKind = self.schedule.parse()?;
        Ok(SchedulePolicy::from_kind(
            kind,
            self.shape.chunk,
            self.shape.workers(),
        ))
    }
}

impl ExecArgs {
    fn jitter(&self) -> Option<Duration> {
        (self.jitter_ms > 0).then(|| Duration::from_millis(self.jitter_ms))
    }

    fn scheduler(&self, workers: usize, shutdown: &CancellationToken) -> Scheduler {
        let mut config = SchedulerConfig::default().with_num_workers(workers);
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Scheduler::new(config).with_shutdown(shutdown.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing on stderr so stdout stays clean for results
    let default_filter = if cli.verbose {
        "warn,chunkrun_executor=debug,chunkrun=debug"
    } else {
        "warn,chunkrun_executor=info,chunkrun=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    if cli.json {
        json_output::enable_json_mode();
    }

    // Ctrl-C cancels whatever run is in progress
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            signal_token.cancel();
        }
    });

    match cli.command {
        Commands::Run { schedule, exec } => run(schedule, exec, &shutdown).await?,
        Commands::Chunks { schedule } => print_chunks(schedule)?,
        Commands::Compare { shape, exec } => compare(shape, exec, &shutdown).await?,
        Commands::Bench { n, workers, exec } => bench(n, workers, exec, &shutdown).await?,
    }

    Ok(())
}

async fn run(
    args: ScheduleArgs,
    exec: ExecArgs,
    shutdown: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let n = problem_size(args.shape.n)?;
    let policy = args.policy()?;
    let scheduler = exec.scheduler(args.shape.workers(), shutdown);
    let compute = exec.workload.compute_fn(n, exec.jitter());

    let outcome = match scheduler
        .run_with_report(n, policy, compute, workload::add, 0)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            json_output::emit_run_failed(&policy.to_string(), &e.to_string());
            return Err(e.into());
        }
    };

    let expected = exec.workload.expected(n);
    if json_output::is_json_mode() {
        json_output::emit(
            JsonEventType::RunCompleted,
            &serde_json::json!({
                "workload": exec.workload,
                "value": outcome.value.to_string(),
                "expected": expected.to_string(),
                "report": outcome.report,
            }),
        );
        return Ok(());
    }

    println!(
        "\nSchedule: {}  n={} workers={}",
        policy, n, outcome.report.workers_started
    );
    print_trace(&outcome.report);
    println!();
    print_worker_stats(&outcome.report);
    println!(
        "\nResult: {}  expected: {}  match: {}  time: {:.4}s",
        outcome.value,
        expected,
        outcome.value == expected,
        outcome.report.elapsed_secs
    );

    Ok(())
}

fn print_chunks(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let n = problem_size(args.shape.n)?;
    let policy = args.policy()?;

    #[derive(Serialize)]
    struct PlannedChunk {
        id: usize,
        start: usize,
        end: usize,
        len: usize,
        worker_id: Option<usize>,
    }

    let planned: Vec<PlannedChunk> = match policy {
        SchedulePolicy::Static {
            chunk_size,
            num_workers,
        } => chunks_static(n, chunk_size, num_workers)?
            .into_iter()
            .map(|a| PlannedChunk {
                id: a.item.id,
                start: a.item.start,
                end: a.item.end,
                len: a.item.len(),
                worker_id: Some(a.worker_id.index()),
            })
            .collect(),
        _ => chunks_for(n, &policy)?
            .into_iter()
            .map(|item| PlannedChunk {
                id: item.id,
                start: item.start,
                end: item.end,
                len: item.len(),
                worker_id: None,
            })
            .collect(),
    };

    if json_output::is_json_mode() {
        json_output::emit(
            JsonEventType::ChunkPlan,
            &serde_json::json!({ "policy": policy, "n": n, "chunks": planned }),
        );
        return Ok(());
    }

    println!("Chunk plan for {} over n={} ({} chunks):", policy, n, planned.len());
    println!("{:<6}  {:<16}  {:<6}  {}", "CHUNK", "RANGE", "SIZE", "WORKER");
    println!("{}", "-".repeat(44));
    for chunk in &planned {
        let worker = chunk
            .worker_id
            .map(|w| w.to_string())
            .unwrap_or_else(|| "any".to_string());
        let range = format!("[{}, {})", chunk.start, chunk.end);
        println!("{:<6}  {:<16}  {:<6}  {}", chunk.id, range, chunk.len, worker);
    }

    Ok(())
}

async fn compare(
    shape: ShapeArgs,
    exec: ExecArgs,
    shutdown: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let n = problem_size(shape.n)?;
    let workers = shape.workers();
    let scheduler = exec.scheduler(workers, shutdown);
    let expected = exec.workload.expected(n);

    #[derive(Serialize)]
    struct CompareRow {
        policy: SchedulePolicy,
        value: String,
        correct: bool,
        elapsed_secs: f64,
    }

    info!(n, chunk = shape.chunk, workers, "Comparing schedules");

    let mut rows = Vec::new();
    for kind in PolicyKind::ALL {
        let policy = SchedulePolicy::from_kind(kind, shape.chunk, workers);
        let compute = exec.workload.compute_fn(n, exec.jitter());
        let outcome = scheduler
            .run_with_report(n, policy, compute, workload::add, 0)
            .await?;
        rows.push(CompareRow {
            policy,
            value: outcome.value.to_string(),
            correct: outcome.value == expected,
            elapsed_secs: outcome.report.elapsed_secs,
        });
    }

    if json_output::is_json_mode() {
        json_output::emit(JsonEventType::CompareSummary, &rows);
        return Ok(());
    }

    println!("n = {}, chunk = {}, workers = {}", n, shape.chunk, workers);
    println!("{:<32}  {:<8}  {}", "SCHEDULE", "CORRECT", "TIME (s)");
    println!("{}", "-".repeat(56));
    for row in &rows {
        println!(
            "{:<32}  {:<8}  {:.4}",
            row.policy.to_string(),
            row.correct,
            row.elapsed_secs
        );
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct BenchRow {
    workers: usize,
    elapsed_secs: f64,
    speedup: f64,
    efficiency_pct: f64,
}

impl BenchRow {
    /// Efficiency is measured against the workers that actually got a block,
    /// which can be fewer than requested on small problems.
    fn new(workers_started: usize, elapsed_secs: f64, base_secs: f64) -> Self {
        let workers = workers_started.max(1);
        let speedup = if elapsed_secs > 0.0 {
            base_secs / elapsed_secs
        } else {
            f64::INFINITY
        };
        Self {
            workers,
            elapsed_secs,
            speedup,
            efficiency_pct: speedup / workers as f64 * 100.0,
        }
    }
}

async fn bench(
    n: i64,
    worker_counts: Vec<usize>,
    exec: ExecArgs,
    shutdown: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let n = problem_size(n)?;
    let expected = exec.workload.expected(n);

    let mut rows: Vec<BenchRow> = Vec::new();
    for workers in worker_counts {
        // One contiguous block per worker.
        let chunk_size = n.div_ceil(workers.max(1)).max(1);
        let policy = SchedulePolicy::Static {
            chunk_size,
            num_workers: workers,
        };
        let scheduler = exec.scheduler(workers, shutdown);
        let compute = exec.workload.compute_fn(n, exec.jitter());
        let outcome = scheduler
            .run_with_report(n, policy, compute, workload::add, 0)
            .await?;
        if outcome.value != expected {
            warn!(workers, value = %outcome.value, expected = %expected, "Wrong result");
        }

        let elapsed = outcome.report.elapsed_secs;
        let base = rows.first().map_or(elapsed, |r| r.elapsed_secs);
        rows.push(BenchRow::new(outcome.report.workers_started, elapsed, base));
    }

    if json_output::is_json_mode() {
        json_output::emit(JsonEventType::BenchSummary, &rows);
        return Ok(());
    }

    println!("{:<10} {:<15} {:<15} {:<15}", "Workers", "Time (s)", "Speedup", "Efficiency (%)");
    println!("{}", "-".repeat(56));
    for row in &rows {
        println!(
            "{:<10} {:<15.6} {:<15.2} {:<15.2}",
            row.workers, row.elapsed_secs, row.speedup, row.efficiency_pct
        );
    }

    Ok(())
}

fn print_trace(report: &RunReport) {
    for record in &report.trace {
        println!(
            "{:03}: chunk {:02} [{}, {}) executed by {}",
            record.seq, record.item_id, record.start, record.end, record.worker_id
        );
    }
}

fn print_worker_stats(report: &RunReport) {
    println!("{:<10}  {:<6}  {}", "WORKER", "CHUNKS", "ITERATIONS");
    println!("{}", "-".repeat(32));
    for stats in &report.workers {
        println!(
            "{:<10}  {:<6}  {}",
            stats.worker_id.to_string(),
            stats.items,
            stats.iterations
        );
    }
}
