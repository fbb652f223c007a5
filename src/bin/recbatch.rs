use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser, Debug)]
#[command(name = "recbatch", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate a batch manifest.
    Validate(ValidateArgs),
    /// Run a batch against an in-memory host built from a scene description.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Input manifest JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Scene JSON for the simulated host.
    #[arg(long)]
    scene: PathBuf,

    /// Scheduler tick in simulated milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Give up after this many simulated seconds.
    #[arg(long, default_value_t = 3600)]
    limit_secs: u64,

    /// Write the batch report JSON here.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recbatch=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Simulate(args) => cmd_simulate(args),
    }
}

fn read_manifest(path: &Path) -> anyhow::Result<recbatch::BatchManifest> {
    recbatch::BatchManifest::load(path)
        .with_context(|| format!("load manifest '{}'", path.display()))
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.in_path)?;
    println!(
        "ok: {} job(s) at {} fps",
        manifest.jobs.len(),
        manifest.config.frame_rate
    );
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let (config, jobs) = read_manifest(&args.in_path)?.into_jobs()?;
    let mut host = recbatch::sim::SimHost::load_scene_json(&args.scene)?;

    let mut queue = recbatch::BatchQueue::new(config)?;
    for job in jobs {
        let id = job.id.clone();
        queue
            .enqueue(job)
            .with_context(|| format!("enqueue job '{id}'"))?;
    }

    let finished_at = host.run_batch(
        &mut queue,
        Duration::from_millis(args.tick_ms),
        Duration::from_secs(args.limit_secs),
    )?;
    let report = queue.report();

    for job in &report.jobs {
        let detail = match (&job.error_kind, &job.message) {
            (Some(kind), Some(msg)) => format!(" [{kind}] {msg}"),
            (Some(kind), None) => format!(" [{kind}]"),
            _ => String::new(),
        };
        println!(
            "{:<24} {:<10} reached {}{}",
            job.job_id.as_str(),
            job.outcome.to_string(),
            job.reached,
            detail
        );
    }
    println!(
        "{} succeeded, {} failed, {} cancelled in {:.1}s simulated",
        report.succeeded,
        report.failed,
        report.cancelled,
        finished_at.as_secs_f64()
    );

    if let Some(out) = &args.out {
        if let Some(parent) = out.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&report).context("serialize batch report")?;
        std::fs::write(out, json).with_context(|| format!("write report '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }

    if !report.all_succeeded() {
        anyhow::bail!(
            "{} of {} job(s) did not complete",
            report.failed + report.cancelled,
            report.jobs.len()
        );
    }
    Ok(())
}
