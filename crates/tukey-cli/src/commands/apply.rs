//! Apply command - treat a data file with a stored interval model.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tukey::{ExecutionContext, IntervalModel, OutlierConfig, TreatmentOptions, Tukey, TukeyConfig};

use super::{treatment_options, write_detection, CommandResult};
use crate::cli::{OutputArgs, TreatmentArgs};

pub fn run(
    file: PathBuf,
    model_path: PathBuf,
    treatment: TreatmentArgs,
    output: OutputArgs,
    ctx: &ExecutionContext,
    verbose: bool,
) -> CommandResult {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }
    if !model_path.exists() {
        return Err(format!(
            "Model file not found: {}\nRun 'tukey detect <FILE> --save-model {}' first.",
            model_path.display(),
            model_path.display()
        )
        .into());
    }

    let model = Arc::new(IntervalModel::load(&model_path)?);
    if !output.json {
        println!(
            "{} {} {} {}",
            "Applying".cyan().bold(),
            model_path.display().to_string().white(),
            "to".cyan().bold(),
            file.display().to_string().white()
        );
    }

    let outliers = OutlierConfig {
        outlier_columns: model.outlier_column_names(),
        group_columns: model.group_column_names(),
        treatment: treatment_options(TreatmentOptions::default(), &treatment),
        ..OutlierConfig::default()
    };
    let tukey = Tukey::with_config(TukeyConfig {
        outliers,
        ..TukeyConfig::default()
    });
    let detection = tukey.apply(&file, model, ctx)?;

    write_detection(&file, &detection, &output, verbose)
}
