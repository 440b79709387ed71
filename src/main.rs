//! Pipeliner - Main Entry Point
//!
//! Runs the streaming labelling pipeline over a CSV file or random samples
//! and prints the completed components.

use anyhow::Context;
use clap::Parser;
use pipeliner_rs::{
    config::{PipelineConfig, SourceConfig},
    pipeline::{nodes::detect_csv_width, PipelineBuilder, RunReport},
};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,pipeliner_rs=debug";

#[derive(Parser, Debug)]
#[command(name = "pipeliner")]
#[command(about = "Streaming connected-component labelling over a staged pipeline")]
struct Args {
    /// Pipeline config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Row width; detected from the first CSV row when omitted with --csv
    #[arg(long)]
    width: Option<usize>,

    /// Read samples from this CSV file
    #[arg(long, conflicts_with = "random")]
    csv: Option<PathBuf>,

    /// Generate this many random sample pairs
    #[arg(long)]
    random: Option<u64>,

    /// Seed for the random source
    #[arg(long)]
    seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log filter, used when RUST_LOG is not set
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    log_level: String,

    /// Also write logs to daily files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn init_logging(args: &Args) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "pipeliner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("logger initialization failed")?;
    Ok(guard)
}

/// Config file (or defaults) with the command-line overrides applied.
fn resolve_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(path) = &args.csv {
        config.source = SourceConfig::Csv { path: path.clone() };
        if args.width.is_none() {
            config.width = detect_csv_width(path)?;
            tracing::info!("Detected row width {} from {:?}", config.width, path);
        }
    } else if let Some(pairs) = args.random {
        config.source = SourceConfig::Random {
            pairs: Some(pairs),
            seed: args.seed,
        };
    } else if let (Some(seed), SourceConfig::Random { seed: slot, .. }) =
        (args.seed, &mut config.source)
    {
        *slot = Some(seed);
    }

    if let Some(width) = args.width {
        config.width = width;
    }
    config.validate()?;
    Ok(config)
}

fn print_report(report: &RunReport) {
    println!(
        "{} component(s) in {} ms{}",
        report.components.len(),
        report.elapsed_ms,
        if report.completed { "" } else { " (incomplete)" }
    );
    for c in &report.components {
        println!(
            "  #{:<5} area {:>6}  rows {}..={}  cols {}..={}",
            c.id, c.area, c.min_row, c.max_row, c.min_col, c.max_col
        );
    }
    for s in &report.stages {
        println!(
            "  stage {:<12} received {:>8}  emitted {:>8}  lost {:>8} ({:.1}%)",
            s.name,
            s.received,
            s.emitted,
            s.lost_chunks,
            s.loss_rate()
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args)?;

    let config = resolve_config(&args)?;
    let max_runtime = config.engine.max_runtime();
    let (mut pipeline, bridge, _ids) = PipelineBuilder::new(config).build()?;

    let report = pipeline.run_until_end(&bridge, max_runtime);
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }
    Ok(())
}
