/// Command-line runner for the mass-wasting engine.
/// Loads a JSON scenario (or builds a synthetic one), runs the Monte-Carlo
/// iterations and reports the summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use runout_core::channel::SegmentId;
use runout_core::montecarlo::RunStats;
use runout_core::scenario::Scenario;
use runout_core::{synthetic, CancelToken, RunSummary};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Synthetic {
    /// 3×3 coarse V-shaped valley with a channel down the middle.
    Valley,
    /// 5×5 closed depression.
    Pit,
}

#[derive(Parser, Debug)]
#[command(name = "runout", about = "Shallow-landslide and debris-flow runout simulation")]
struct Args {
    /// Scenario JSON file.
    #[arg(short, long, conflicts_with = "synthetic")]
    scenario: Option<PathBuf>,

    /// Run a built-in synthetic scenario instead of a file.
    #[arg(long, value_enum)]
    synthetic: Option<Synthetic>,

    /// Override the Monte-Carlo iteration count.
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Override the random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Append the run summary line to this file.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write per-cell and per-segment results as JSON.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct SegmentReport {
    id: SegmentId,
    volume: f64,
    mass: Vec<f64>,
}

#[derive(Serialize)]
struct Report {
    summary: RunSummary,
    stats: RunStats,
    fine_rows: usize,
    fine_cols: usize,
    failure_probability: Vec<f64>,
    delta_depth: Vec<f64>,
    sediment_delivered_to_channel: Vec<f64>,
    segments: Vec<SegmentReport>,
}

fn load(args: &Args) -> Result<Scenario> {
    let mut scenario = match (&args.scenario, args.synthetic) {
        (Some(path), _) => {
            Scenario::from_path(path).with_context(|| format!("loading scenario {}", path.display()))?
        }
        (None, Some(Synthetic::Valley)) => synthetic::valley(3, 3, 3, 10.0, 35.0, 1.2),
        (None, Some(Synthetic::Pit)) => synthetic::pit(5, 10.0, 20.0, 1.0),
        (None, None) => anyhow::bail!("no input specified; pass --scenario or --synthetic (see --help)"),
    };
    if let Some(n) = args.iterations {
        scenario.params.iterations = n;
    }
    if let Some(seed) = args.seed {
        scenario.params.seed = seed;
    }
    Ok(scenario)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let scenario = load(&args)?;
    let label = scenario.label.clone();
    let mut basin = scenario.build().with_context(|| format!("preparing scenario '{label}'"))?;
    info!(
        "{label}: {}×{} fine cells, {} channel segments, {} iterations",
        basin.terrain.fine_rows(),
        basin.terrain.fine_cols(),
        basin.network.len(),
        basin.params.effective_iterations()
    );

    let out = basin.run(&CancelToken::new()).context("mass-wasting run failed")?;
    println!("{}", out.summary);

    if let Some(path) = &args.summary {
        out.summary
            .append_to(path)
            .with_context(|| format!("appending summary to {}", path.display()))?;
    }

    if let Some(path) = &args.output {
        let t = &basin.terrain;
        let report = Report {
            summary: out.summary.clone(),
            stats: out.stats,
            fine_rows: t.fine_rows(),
            fine_cols: t.fine_cols(),
            failure_probability: t.fine.iter().map(|c| c.failure_probability).collect(),
            delta_depth: t.fine.iter().map(|c| c.delta_depth()).collect(),
            sediment_delivered_to_channel: t.fine.iter().map(|c| c.sediment_delivered_to_channel).collect(),
            segments: basin
                .network
                .iter()
                .map(|s| SegmentReport { id: s.id, volume: s.temp_volume, mass: s.temp_mass.clone() })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("results written to {}", path.display());
    }

    Ok(())
}
