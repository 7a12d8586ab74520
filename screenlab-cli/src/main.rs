//! ScreenLab CLI: list models, run a screen, inspect results.
//!
//! Commands:
//! - `list`: models discovered in the registry, plus rejected definitions
//! - `run`: scan every selected model, aggregate, save artifacts
//! - `profile`: one company across every model of the latest run
//! - `best`: strongest tickers of one flag category in the latest run

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use screenlab_core::{best_of, company_profile, Category, ConsensusRecord, ModelResult};
use screenlab_runner::{
    load_artifacts, save_artifacts, synthetic_source, CsvDirectory, DatasetSource, ModelRegistry,
    RunReport, Runner, ScreenerConfig, Selection,
};

const DEFAULT_CONFIG: &str = "screenlab.toml";

#[derive(Parser)]
#[command(
    name = "screenlab",
    about = "ScreenLab CLI: multi-model fundamental stock screener"
)]
struct Cli {
    /// Settings file. Defaults to ./screenlab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with one CSV per model dataset.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory of model definitions replacing the built-ins.
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Output directory for run artifacts.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the models available to a run.
    List,
    /// Run the screen and save artifacts.
    Run {
        /// Only run these model ids (repeatable).
        #[arg(long)]
        only: Vec<String>,

        /// Generate deterministic demo datasets instead of reading CSVs.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Rows shown per model.
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Rows shown from the consensus ranking.
        #[arg(long, default_value_t = 20)]
        consensus_top: usize,
    },
    /// Show one ticker across every model of a saved run.
    Profile {
        ticker: String,

        /// Artifact directory. Defaults to <output_dir>/latest.
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Strongest tickers for one flag category in a saved run.
    Best {
        #[arg(value_enum)]
        category: Category,

        #[arg(long, default_value_t = 10)]
        n: usize,

        /// Artifact directory. Defaults to <output_dir>/latest.
        #[arg(long)]
        from: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::List => run_list(&config),
        Commands::Run {
            only,
            synthetic,
            top,
            consensus_top,
        } => run_screen(&config, only, synthetic, top, consensus_top),
        Commands::Profile { ticker, from } => {
            let dir = from.unwrap_or_else(|| config.run.output_dir.join("latest"));
            run_profile(&dir, &ticker)
        }
        Commands::Best { category, n, from } => {
            let dir = from.unwrap_or_else(|| config.run.output_dir.join("latest"));
            run_best(&dir, category, n)
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Settings file (explicit, or the default when present) plus CLI overrides.
fn load_config(cli: &Cli) -> Result<ScreenerConfig> {
    let mut config = match &cli.config {
        Some(path) => ScreenerConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            ScreenerConfig::from_file(Path::new(DEFAULT_CONFIG))?
        }
        None => ScreenerConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.run.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.models_dir {
        config.run.models_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.run.output_dir = dir.clone();
    }
    Ok(config)
}

fn load_registry(config: &ScreenerConfig) -> Result<ModelRegistry> {
    match &config.run.models_dir {
        Some(dir) => ModelRegistry::from_dir(dir),
        None => Ok(ModelRegistry::builtin()),
    }
}

fn run_list(config: &ScreenerConfig) -> Result<()> {
    let registry = load_registry(config)?;

    println!(
        "{:<24} {:<28} {:<11} {:<28} {}",
        "ID", "NAME", "THEME", "DATASET", "ENABLED"
    );
    for model in registry.models() {
        println!(
            "{:<24} {:<28} {:<11} {:<28} {}",
            model.id(),
            model.name(),
            model.theme().as_str(),
            model.dataset(),
            if model.enabled() { "yes" } else { "no" }
        );
    }

    if !registry.rejected().is_empty() {
        println!();
        println!("--- Rejected definitions ---");
        for r in registry.rejected() {
            println!("{}: {}", r.id, r.error);
        }
    }
    Ok(())
}

fn run_screen(
    config: &ScreenerConfig,
    only: Vec<String>,
    synthetic: bool,
    top: usize,
    consensus_top: usize,
) -> Result<()> {
    let registry = load_registry(config)?;
    let ids = if only.is_empty() {
        config.run.only.clone()
    } else {
        only
    };
    let selection = Selection::from_ids(ids);

    let source: Box<dyn DatasetSource> = if synthetic {
        Box::new(synthetic_source(
            registry.models(),
            config.run.synthetic_rows,
            config.run.synthetic_seed,
        ))
    } else {
        if !config.run.data_dir.is_dir() {
            bail!(
                "data directory {} does not exist (use --synthetic for demo data)",
                config.run.data_dir.display()
            );
        }
        Box::new(CsvDirectory::new(&config.run.data_dir))
    };

    let report = Runner::new(config.aggregation.clone())
        .run(&registry, source.as_ref(), &selection)
        .context("screening run failed")?;

    print_report(&report, top, consensus_top);

    let run_dir = save_artifacts(&report, &config.run.output_dir)?;
    info!(dir = %run_dir.display(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn print_report(report: &RunReport, top: usize, consensus_top: usize) {
    for result in report.results.values() {
        print_model_top(result, top);
    }

    println!();
    println!("=== Consensus (top {consensus_top}) ===");
    println!(
        "{:>3}  {:<10} {:>7} {:>4} {:>6} {:>5}  THESIS",
        "#", "TICKER", "SIGNAL", "COV", "ELITE", "WARN"
    );
    for (i, r) in report.consensus.iter().take(consensus_top).enumerate() {
        print_consensus_line(i + 1, r);
    }

    if !report.skipped_models.is_empty() {
        println!();
        println!("--- Skipped models ---");
        for s in &report.skipped_models {
            println!("{}: {}", s.model_id, s.reason);
        }
    }
    let skipped_rows = report.skipped_row_count();
    if skipped_rows > 0 {
        println!("Rows skipped: {skipped_rows} (see report.md)");
    }
    if report.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

fn print_model_top(result: &ModelResult, top: usize) {
    println!();
    println!(
        "=== {} ({}, {} rows, {} skipped) ===",
        result.model_name,
        result.theme,
        result.len(),
        result.skipped().len()
    );
    for (rank, row) in result.ranked().take(top) {
        println!(
            "{:>3}. {:<10} {:>6.1}  {}",
            rank,
            row.ticker(),
            row.score,
            row.flags.render_brackets()
        );
    }
}

fn print_consensus_line(rank: usize, r: &ConsensusRecord) {
    println!(
        "{:>3}  {:<10} {:>7.2} {:>4} {:>6.0} {:>5}  {}",
        rank, r.ticker, r.signal_strength, r.coverage, r.elite_score, r.warning_count, r.thesis
    );
}

fn run_profile(dir: &Path, ticker: &str) -> Result<()> {
    let report = load_artifacts(dir)?;
    let Some(profile) = company_profile(ticker, &report.results, &report.consensus) else {
        bail!("ticker '{ticker}' does not appear in any model of {}", dir.display());
    };

    println!("=== {} ===", profile.ticker);
    if let (Some(rank), Some(c)) = (profile.consensus_rank, &profile.consensus) {
        println!("Consensus rank: {rank} of {}", report.consensus.len());
        println!("Signal:         {:.2}", c.signal_strength);
        println!("Coverage:       {}", c.coverage);
        println!("Elite score:    {:.0}", c.elite_score);
        println!("Flags/model:    {:.2}", c.flag_density);
        println!("Warnings:       {}", c.warning_count);
        println!("Avg / best rank:{:.1} / {}", c.avg_rank, c.best_rank);
        println!("Thesis:         {}", c.thesis);
    }

    for entry in &profile.models {
        println!();
        println!(
            "--- {} : #{} of {}, score {:.1} {}",
            entry.model_name,
            entry.rank,
            entry.of,
            entry.score,
            entry.flags.render_brackets()
        );
        for (name, value) in &entry.components {
            println!("    {name:<20} {value:>6.1}");
        }
    }
    Ok(())
}

fn run_best(dir: &Path, category: Category, n: usize) -> Result<()> {
    let report = load_artifacts(dir)?;
    let picked = best_of(&report.consensus, category, n);
    if picked.is_empty() {
        println!("No tickers carry {category} flags.");
        return Ok(());
    }

    println!("=== Best {category} (top {n}) ===");
    for (i, r) in picked.iter().enumerate() {
        let strength = r.category_strength.get(&category).copied().unwrap_or(0.0);
        println!(
            "{:>3}  {:<10} strength {:>5.2}  signal {:>6.2}  {}",
            i + 1,
            r.ticker,
            strength,
            r.signal_strength,
            r.thesis
        );
    }
    Ok(())
}
