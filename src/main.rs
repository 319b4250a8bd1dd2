use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use epc_processor::config::{BlankIdentifierPolicy, Config, FilenameCheck};
use epc_processor::pipeline::{enumerate_sources, Pipeline, PipelineResult};
use epc_processor::{constants, logging, metrics};
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Parser)]
#[command(name = "epc_processor")]
#[command(about = "Merge quarterly EPC extracts into deduplicated per-local-authority CSV files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML configuration file (defaults to $EPC_CONFIG, then ./epc_processor.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every input file and write the consolidated and per-authority outputs
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Directory holding the quarterly CSV extracts
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory receiving the outputs
        #[arg(long)]
        output: Option<PathBuf>,
        /// What to do with rows whose identifier is blank
        #[arg(long, value_enum)]
        blank_identifiers: Option<BlankIdentifierPolicy>,
        /// How strictly file names must carry a period such as 2022Q1
        #[arg(long, value_enum)]
        filename_check: Option<FilenameCheck>,
        /// Write a Prometheus textfile snapshot of the run's metrics
        #[arg(long)]
        metrics_file: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List input files in processing order (newest first) without reading them
    Inputs {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum)]
        filename_check: Option<FilenameCheck>,
    },
    /// Print the effective export column list
    Columns {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn load_config(args: &ConfigArgs) -> Result<Config> {
    Config::load(args.config.as_deref()).context("Failed to load configuration")
}

fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_LOG_DIR));
    logging::init_logging(&log_dir)
}

fn print_summary(result: &PipelineResult) {
    println!("\n📊 Energy efficiency data processed");
    println!("   Input files: {}", result.files_found);
    println!("   Rows read: {}", result.total_rows);
    println!("   Unique addresses: {}", result.unique_records);
    println!("   Duplicate addresses: {}", result.duplicates);
    if result.blank_identifiers > 0 {
        println!(
            "   Blank identifiers: {} ({} skipped)",
            result.blank_identifiers, result.skipped_blank_identifiers
        );
    }
    println!("   Consolidated file: {}", result.consolidated_file.display());
    println!("   Local authority files: {}", result.partitions.len());
    for partition in &result.partitions {
        println!("     - {} ({} rows)", partition.label, partition.rows);
    }
}

fn run(config: &Config, metrics_file: Option<&Path>, json: bool) -> Result<()> {
    if metrics_file.is_some() {
        metrics::init_metrics();
    }

    let outcome = Pipeline::run(config);

    if let Some(path) = metrics_file {
        if let Err(e) = metrics::write_textfile(path) {
            error!("Failed to write metrics snapshot: {}", e);
        }
    }

    let result = outcome.context("Processing failed")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input,
            output,
            blank_identifiers,
            filename_check,
            metrics_file,
            json,
        } => {
            let mut config = load_config(&config)?;
            if let Some(dir) = input {
                config.input.dir = dir;
            }
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            if let Some(policy) = blank_identifiers {
                config.columns.blank_identifiers = policy;
            }
            if let Some(check) = filename_check {
                config.input.filename_check = check;
            }
            if metrics_file.is_some() {
                config.metrics_file = metrics_file;
            }

            let _guard = init_logging(&config);
            run(&config, config.metrics_file.as_deref(), json)
        }
        Commands::Inputs {
            config,
            input,
            filename_check,
        } => {
            let mut config = load_config(&config)?;
            if let Some(dir) = input {
                config.input.dir = dir;
            }
            if let Some(check) = filename_check {
                config.input.filename_check = check;
            }

            let _guard = init_logging(&config);
            let sources = enumerate_sources(&config.input.dir, &config.input)
                .with_context(|| format!("Failed to list {}", config.input.dir.display()))?;
            for source in &sources {
                match &source.period {
                    Some(period) => println!("{:>4}  {}  [{}]", source.rank, source.name, period),
                    None => println!("{:>4}  {}", source.rank, source.name),
                }
            }
            Ok(())
        }
        Commands::Columns { config } => {
            let config = load_config(&config)?;
            for (i, column) in config.columns.export.iter().enumerate() {
                let marker = if i == 0 { "  (partition key)" } else { "" };
                println!("{:>2}  {}{}", i, column, marker);
            }
            println!("id  {}", config.columns.id_column);
            Ok(())
        }
    }
}
