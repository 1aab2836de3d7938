//! refgen - PubMed reference pipeline
//!
//! ## Usage
//!
//! ```bash
//! refgen run --input lists/ --output output/ --threshold 10 \
//!     --email you@example.org --api-key $NCBI_API_KEY
//! refgen reset --output output/
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use refgen::config::{Config, Credentials, DEFAULT_THRESHOLD};
use refgen::output::reset_output_dir;
use refgen::pipeline::Pipeline;
use refgen::source::PubMedSource;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// PubMed reference pipeline - citation threshold, deduplication and export
#[derive(Parser)]
#[command(name = "refgen")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a directory of PMID lists
    Run {
        /// Directory of newline-delimited PMID .txt files
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (cleared before the run)
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Minimum citation count for inclusion
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u32,

        /// NCBI account email
        #[arg(long, env = "NCBI_EMAIL", hide_env_values = true)]
        email: String,

        /// NCBI API key
        #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Minimum delay between E-utilities requests, in milliseconds
        #[arg(long, default_value = "350")]
        request_interval_ms: u64,

        /// Skip DOI recovery through Crossref
        #[arg(long)]
        no_crossref: bool,

        /// Write bibliographies as plain ASCII
        #[arg(long)]
        ascii: bool,
    },

    /// Clear the output directory
    Reset {
        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run {
            input,
            output,
            threshold,
            email,
            api_key,
            request_interval_ms,
            no_crossref,
            ascii,
        } => {
            let mut config = Config::new(Credentials::new(email, api_key), input, output)
                .with_threshold(threshold);
            config.request_interval = Duration::from_millis(request_interval_ms);
            config.crossref = !no_crossref;
            config.ascii = ascii;

            run_pipeline(config).await
        }
        Commands::Reset { output } => {
            let removed = reset_output_dir(&output)
                .with_context(|| format!("Failed to reset {}", output.display()))?;
            println!("Removed {} entries from {}", removed, output.display());
            Ok(())
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

async fn run_pipeline(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    println!("=== refgen ===");
    println!("Input:     {}", config.input_dir.display());
    println!("Output:    {}", config.output_dir.display());
    println!("Threshold: {}", config.threshold);

    let source = PubMedSource::from_config(&config).context("Failed to build API clients")?;
    let summary = Pipeline::new(&config, &source)
        .run()
        .await
        .context("Pipeline failed")?;

    let counts = &summary.counts;
    println!("\n=== Summary ===");
    println!("Identifiers read:        {}", counts.initial);
    println!("Below threshold:         {}", counts.excluded_by_threshold);
    println!("Citation count failures: {}", counts.count_failures);
    println!("Record failures:         {}", counts.record_failures);
    println!("Combined records:        {}", counts.combined);
    println!("Duplicates removed:      {}", counts.duplicates_removed);
    println!("Final records:           {}", counts.final_count);

    info!(dir = %config.output_dir.display(), "Outputs written");
    Ok(())
}
