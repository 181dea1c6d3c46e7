use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pharmaceutical production planner", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline (Input Normalizer -> Feasibility Estimator ->
    /// Main Scheduler -> Type-R Specialized Scheduler -> Plan Assembler)
    /// against a planning request file and print the assembled plan.
    Plan {
        /// Path to a planning request JSON file (§6 External Interfaces).
        input: PathBuf,
        /// Write the plan to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Objective weight on run earliness (default 3, §4.3).
        #[arg(long, default_value_t = 3)]
        weight_earliness: i64,
        /// Objective weight on activated run count (default 2, §4.3).
        #[arg(long, default_value_t = 2)]
        weight_runs: i64,
        /// Objective weight on total capacity used (default 1, §4.3).
        #[arg(long, default_value_t = 1)]
        weight_capacity: i64,
        #[arg(value_enum, long, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Run only the Feasibility Estimator (§4.2) and report per-product
    /// capacity and demand gaps, without the expensive Main Scheduler solve.
    Feasibility {
        input: PathBuf,
        #[arg(value_enum, long, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Run the Input Normalizer alone and report normalization diagnostics
    /// (§4.1, §7): skipped products, defaulted values, unparseable dates.
    Validate { input: PathBuf },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}
