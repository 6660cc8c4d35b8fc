//! fsh-validator CLI
//!
//! Validates the instances of a FHIR Shorthand project with the HL7 FHIR
//! validator.

mod commands;
mod output;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use fsh_validator_core::{EXIT_FATAL, init_tracing};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "fsh-validator")]
#[command(about = "Validate FHIR Shorthand (FSH) instances with the HL7 FHIR validator")]
#[command(version = fsh_validator_core::VERSION)]
#[command(
    long_about = "Runs SUSHI, selects the instances declared in the given FSH files and\n\
validates them in batches with the HL7 FHIR validator.\n\
\n\
Examples:\n  \
fsh-validator observations.fsh            # Validate instances from one file\n  \
fsh-validator --all                       # Validate every instance\n  \
fsh-validator --all --subdir labs         # Only files below input/fsh/labs\n  \
fsh-validator --all --no-sushi -j 4       # Reuse SUSHI output, 4 validators at once"
)]
pub struct Cli {
    /// FSH file names (base name only, no path)
    #[arg(value_name = "FILENAMES", required_unless_present = "all")]
    pub filenames: Vec<String>,

    /// Validate every FSH file of the project
    #[arg(long, conflicts_with = "filenames")]
    pub all: bool,

    /// Subdirectory of input/fsh/ to restrict --all to
    #[arg(long, value_name = "DIR", requires = "all")]
    pub subdir: Option<PathBuf>,

    /// Directory holding validator_cli.jar, or the validator itself
    #[arg(long, value_name = "DIR")]
    pub validator_path: Option<PathBuf>,

    /// Where to download validator_cli.jar from when it is missing
    #[arg(
        long,
        value_name = "URL",
        env = "FSH_VALIDATOR_URL",
        default_value = commands::download::VALIDATOR_URL
    )]
    pub validator_url: String,

    /// Java binary used to run the validator jar
    #[arg(long, value_name = "PATH", env = "FSH_VALIDATOR_JAVA")]
    pub java: Option<PathBuf>,

    /// Do not run SUSHI before validating
    #[arg(long)]
    pub no_sushi: bool,

    /// Write per-batch and summary logs to this directory
    #[arg(long, value_name = "DIR")]
    pub log_path: Option<PathBuf>,

    /// Maximum number of instances per validator run
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Number of validator runs at the same time
    #[arg(
        short = 'j',
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub jobs: u64,

    /// Time limit for a single validator run, in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Project directory (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored per-instance listing and summary
    Human,
    /// Report as JSON on stdout
    Json,
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().min(8))
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {e}");
            std::process::exit(EXIT_FATAL);
        }
    };

    let code = runtime.block_on(async_main());
    std::process::exit(code);
}

async fn async_main() -> i32 {
    let cli = Cli::parse();

    if !cli.no_color && std::env::var("NO_COLOR").is_err() {
        colored::control::set_override(true);
    } else {
        colored::control::set_override(false);
    }

    let log_filter = match cli.verbose {
        0 => "fsh_validator=warn",
        1 => fsh_validator_core::DEFAULT_LOG_FILTER,
        2 => "fsh_validator=debug",
        _ => "fsh_validator=trace",
    };
    init_tracing(log_filter);

    match commands::validate::validate_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Validation aborted: {}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            EXIT_FATAL
        }
    }
}
