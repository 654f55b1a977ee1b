mod aggregate;
mod config;
mod extract;
mod render;
mod scalar;
mod series;
mod walker;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use aggregate::Aggregator;
use config::{Config, VariantConfig, DEFAULT_CONFIG_FILE};
use walker::FsWalker;

/// Collect benchmark metrics (LIKWID counter tables and raw timing dumps)
/// from per-variant result trees into ordered series for charting.
#[derive(Parser, Debug)]
#[command(name = "benchseries", version, about)]
pub struct Cli {
    /// Variant roots as NAME=PATH or PATH (replaces the configured variants)
    #[arg(value_name = "VARIANT", value_parser = config::parse_variant_arg)]
    variants: Vec<VariantConfig>,

    /// Config file path (default: benchseries.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the JSON export
    #[arg(short, long, default_value = "series.json")]
    output: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (pattern matches, fallback decisions)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Write the JSON export and print a summary
    Json,
    /// Print the summary only
    Summary,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn resolve_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path, true)?,
        None => Config::load(&PathBuf::from(DEFAULT_CONFIG_FILE), false)?,
    };
    if !cli.variants.is_empty() {
        config.variants = cli.variants.clone();
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;
    let aggregator = Aggregator::new(config)?;

    if cli.dry_run {
        println!("{}", toml::to_string_pretty(aggregator.config())?);
        println!("# config valid, not running");
        return Ok(());
    }

    let result = aggregator.run(&FsWalker::new())?;

    if cli.format == Format::Json {
        render::write_json(&result, &cli.output)?;
    }
    if !cli.quiet || cli.format == Format::Summary {
        print!("{}", render::summary(&result));
    }
    Ok(())
}
