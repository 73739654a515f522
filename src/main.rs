//! tidy-panda CLI – load, clean and analyze a tabular file
//!
//! ```bash
//! tidy-panda --file data.csv --clean                  # load and clean
//! tidy-panda --file data.csv --all                    # clean + analyze
//! tidy-panda --file data.json --analyze -o results/   # custom output directory
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for more detail.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tidy_panda::pipeline::{self, PipelineOptions};

#[derive(Parser)]
#[command(name = "tidy-panda")]
#[command(about = "Data processing pipeline - load, clean, analyze", long_about = None)]
struct Cli {
    /// Input data file (CSV, JSON, Excel or Parquet)
    #[arg(short, long)]
    file: PathBuf,

    /// Clean the data (missing values, duplicates, whitespace)
    #[arg(short, long)]
    clean: bool,

    /// Strategy for handling missing values
    #[arg(long, default_value = "drop", value_parser = ["drop", "fill", "forward_fill"])]
    clean_strategy: String,

    /// Remove IQR outliers from this column while cleaning (repeatable)
    #[arg(long = "outliers", value_name = "COLUMN")]
    outlier_columns: Vec<String>,

    /// Analyze the data and write a statistics report
    #[arg(short, long)]
    analyze: bool,

    /// Run the complete pipeline (clean + analyze)
    #[arg(long)]
    all: bool,

    /// Output directory for reports
    #[arg(short, long, default_value = "output")]
    output: PathBuf,
}

impl From<Cli> for PipelineOptions {
    fn from(cli: Cli) -> Self {
        PipelineOptions {
            file: cli.file,
            clean: cli.clean || cli.all,
            strategy: cli.clean_strategy,
            outlier_columns: cli.outlier_columns,
            analyze: cli.analyze || cli.all,
            output_dir: cli.output,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let options = PipelineOptions::from(Cli::parse());
    let outcome = pipeline::run(&options)
        .with_context(|| format!("pipeline failed for {}", options.file.display()))?;

    println!(
        "Loaded {} rows, {} columns",
        outcome.rows_loaded, outcome.columns_loaded
    );
    match &outcome.cleaning {
        Some(report) => println!(
            "Cleaned: {} -> {} rows (removed {} problematic rows)",
            report.original_rows,
            report.final_rows.unwrap_or(report.original_rows),
            report.rows_removed()
        ),
        None => println!("Skipping data cleaning (use --clean to enable)"),
    }
    match &outcome.report {
        Some(text) => println!("{text}"),
        None => println!("Skipping analysis (use --analyze to enable)"),
    }
    for path in &outcome.written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
