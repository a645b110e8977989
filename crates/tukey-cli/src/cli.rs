//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use tukey::stats::{CorrelationMethod, PValueAlternative};
use tukey::{
    DetectionScope, EstimationType, OutputFormat, QuantileMethod, ReplacementStrategy,
    TreatmentAction,
};

/// Tukey: group-aware IQR outlier detection and treatment
#[derive(Parser)]
#[command(name = "tukey")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as one JSON object per line (stderr)
    #[arg(long, global = true)]
    pub json_log: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate permitted intervals and treat the outliers of a data file
    Detect {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// JSON configuration file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Outlier columns (repeat or separate with commas)
        #[arg(short, long = "column", value_delimiter = ',')]
        columns: Vec<String>,

        /// Group columns (repeat or separate with commas)
        #[arg(short, long = "group", value_delimiter = ',')]
        groups: Vec<String>,

        /// IQR multiplier k
        #[arg(short = 'k', long)]
        multiplier: Option<f64>,

        /// Quantile estimation type (legacy, r1 .. r9)
        #[arg(long, value_parser = parse_snake::<EstimationType>)]
        estimation: Option<EstimationType>,

        /// Quantile computation (exact, heuristic, auto)
        #[arg(long, value_parser = parse_snake::<QuantileMethod>)]
        method: Option<QuantileMethod>,

        /// Split the treatment into this many parallel partitions
        #[arg(long)]
        partitions: Option<usize>,

        /// Save the interval model to this path
        #[arg(long)]
        save_model: Option<PathBuf>,

        #[command(flatten)]
        treatment: TreatmentArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Treat a data file with a stored interval model
    Apply {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Interval model written by `detect --save-model`
        #[arg(short, long)]
        model: PathBuf,

        #[command(flatten)]
        treatment: TreatmentArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show the intervals of a stored model
    Summary {
        /// Interval model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank correlation between numeric columns
    Correlate {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Columns to correlate (default: all numeric columns)
        #[arg(short, long = "column", value_delimiter = ',')]
        columns: Vec<String>,

        /// spearman, kendall_tau_a, kendall_tau_b or gamma
        #[arg(long, default_value = "spearman", value_parser = parse_snake::<CorrelationMethod>)]
        method: CorrelationMethod,

        /// Alternative hypothesis of the p-value: two_sided, less, greater
        #[arg(long, default_value = "two_sided", value_parser = parse_snake::<PValueAlternative>)]
        alternative: PValueAlternative,

        #[command(flatten)]
        output: TableOutputArgs,
    },

    /// Friedman test over three or more related columns
    Friedman {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Columns to compare (default: all numeric columns)
        #[arg(short, long = "column", value_delimiter = ',')]
        columns: Vec<String>,

        /// Significance level
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        #[command(flatten)]
        output: TableOutputArgs,
    },

    /// Shapiro-Wilk normality test per column
    Normality {
        /// Path to the data file (CSV/TSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Columns to test (default: all numeric columns)
        #[arg(short, long = "column", value_delimiter = ',')]
        columns: Vec<String>,

        /// Significance level
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        /// Use Shapiro-Francia for leptokurtic columns
        #[arg(long)]
        francia: bool,

        #[command(flatten)]
        output: TableOutputArgs,
    },
}

/// Treatment flags shared by `detect` and `apply`.
#[derive(Args, Debug, Clone, Default)]
pub struct TreatmentArgs {
    /// lower_only, upper_only or both
    #[arg(long, value_parser = parse_snake::<DetectionScope>)]
    pub scope: Option<DetectionScope>,

    /// replace, filter_outlier_rows or retain_outlier_rows
    #[arg(long, value_parser = parse_snake::<TreatmentAction>)]
    pub action: Option<TreatmentAction>,

    /// set_missing or clamp_to_boundary
    #[arg(long, value_parser = parse_snake::<ReplacementStrategy>)]
    pub replacement: Option<ReplacementStrategy>,

    /// Refresh the column domains from the treated values
    #[arg(long)]
    pub update_domain: bool,
}

/// Outputs of a treatment run.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Treated table (default: <file>.treated.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Summary table; printed when omitted
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Table format (csv, tsv, json); guessed from the output path otherwise
    #[arg(short, long, value_parser = parse_snake::<OutputFormat>)]
    pub format: Option<OutputFormat>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Output of the statistics commands.
#[derive(Args, Debug, Clone, Default)]
pub struct TableOutputArgs {
    /// Write the result table here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Table format (csv, tsv, json)
    #[arg(short, long, value_parser = parse_snake::<OutputFormat>)]
    pub format: Option<OutputFormat>,
}

/// Parse a flag value into one of the library's snake_case enums.
///
/// Dashes are accepted in place of underscores.
pub fn parse_snake<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    let normalized = s.trim().to_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| format!("Unknown value: {}", s))
}
