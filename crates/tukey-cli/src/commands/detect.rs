//! Detect command - estimate intervals and treat outliers in one pass over a file.

use std::path::PathBuf;

use colored::Colorize;
use tukey::{EstimationType, ExecutionContext, OutlierConfig, QuantileMethod, Tukey};

use super::{treatment_options, write_detection, CommandResult};
use crate::cli::{OutputArgs, TreatmentArgs};

pub struct DetectArgs {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub columns: Vec<String>,
    pub groups: Vec<String>,
    pub multiplier: Option<f64>,
    pub estimation: Option<EstimationType>,
    pub method: Option<QuantileMethod>,
    pub partitions: Option<usize>,
    pub save_model: Option<PathBuf>,
    pub treatment: TreatmentArgs,
    pub output: OutputArgs,
}

/// Configuration file first, then command line flags.
fn build_config(args: &DetectArgs) -> Result<OutlierConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => OutlierConfig::from_json_file(path)?,
        None => OutlierConfig::default(),
    };
    if !args.columns.is_empty() {
        config.outlier_columns = args.columns.clone();
    }
    if !args.groups.is_empty() {
        config.group_columns = args.groups.clone();
    }
    if let Some(k) = args.multiplier {
        config.iqr_multiplier = k;
    }
    if let Some(estimation) = args.estimation {
        config.estimation_type = estimation;
    }
    if let Some(method) = args.method {
        config.method = method;
    }
    config.treatment = treatment_options(config.treatment, &args.treatment);
    config.validate()?;
    Ok(config)
}

pub fn run(args: DetectArgs, ctx: &ExecutionContext, verbose: bool) -> CommandResult {
    if !args.file.exists() {
        return Err(format!("File not found: {}", args.file.display()).into());
    }

    let config = build_config(&args)?;
    if !args.output.json {
        println!(
            "{} {}",
            "Detecting outliers in".cyan().bold(),
            args.file.display().to_string().white()
        );
    }
    if verbose {
        println!(
            "  columns: {}  groups: {}  k = {}  estimation: {:?}",
            config.outlier_columns.join(", "),
            config.group_columns.join(", "),
            config.iqr_multiplier,
            config.estimation_type
        );
    }

    let mut tukey = Tukey::new(config);
    if let Some(partitions) = args.partitions {
        tukey = tukey.with_partitions(partitions);
    }
    let detection = tukey.detect(&args.file, ctx)?;

    if let Some(path) = &args.save_model {
        detection.result.model.save(path)?;
        if !args.output.json {
            println!(
                "{} {}",
                "Model saved to".green().bold(),
                path.display().to_string().white()
            );
        }
    }

    write_detection(&args.file, &detection, &args.output, verbose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tukey::TreatmentAction;

    fn args(config: Option<PathBuf>) -> DetectArgs {
        DetectArgs {
            file: PathBuf::from("data.csv"),
            config,
            columns: Vec::new(),
            groups: vec!["site".into()],
            multiplier: Some(3.0),
            estimation: None,
            method: None,
            partitions: None,
            save_model: None,
            treatment: TreatmentArgs {
                action: Some(TreatmentAction::FilterOutlierRows),
                ..TreatmentArgs::default()
            },
            output: OutputArgs::default(),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"outlier_columns": ["v"], "iqr_multiplier": 2.0, "estimation_type": "r7"}}"#)
            .unwrap();

        let config = build_config(&args(Some(file.path().to_path_buf()))).unwrap();
        assert_eq!(config.outlier_columns, vec!["v"]);
        assert_eq!(config.group_columns, vec!["site"]);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.estimation_type, EstimationType::R7);
        assert_eq!(config.treatment.action, TreatmentAction::FilterOutlierRows);
    }

    #[test]
    fn test_no_columns_is_an_error() {
        assert!(build_config(&args(None)).is_err());
    }
}
