//! CLI command implementations.

pub mod apply;
pub mod correlate;
pub mod detect;
pub mod friedman;
pub mod normality;
pub mod summary;

use std::path::{Path, PathBuf};

use colored::Colorize;
use tukey::{
    DataTable, Detection, OutputFormat, TableWriter, TreatmentOptions, WarningLog,
};

use crate::cli::{OutputArgs, TableOutputArgs, TreatmentArgs};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Apply treatment flags on top of `base`.
fn treatment_options(base: TreatmentOptions, args: &TreatmentArgs) -> TreatmentOptions {
    let mut options = base;
    if let Some(scope) = args.scope {
        options.scope = scope;
    }
    if let Some(action) = args.action {
        options.action = action;
    }
    if let Some(replacement) = args.replacement {
        options.replacement = replacement;
    }
    options.update_domain |= args.update_domain;
    options
}

fn print_warnings(warnings: &WarningLog) {
    for message in warnings.messages() {
        eprintln!("{} {}", "Warning:".yellow().bold(), message);
    }
}

/// All numeric columns when `columns` is empty.
fn columns_or_numeric(table: &DataTable, columns: Vec<String>) -> Vec<String> {
    if !columns.is_empty() {
        return columns;
    }
    table
        .schema
        .numeric_columns()
        .map(|c| c.name.clone())
        .collect()
}

fn default_output_path(file: &Path, format: OutputFormat) -> PathBuf {
    let stem = file.file_stem().unwrap_or_default().to_string_lossy();
    file.with_file_name(format!("{}.treated.{}", stem, format.extension()))
}

/// Write the treated table and summary of a run and print its report.
fn write_detection(
    file: &Path,
    detection: &Detection,
    args: &OutputArgs,
    verbose: bool,
) -> CommandResult {
    let report = detection.report();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let format = args
        .format
        .or_else(|| args.output.as_deref().map(OutputFormat::from_path))
        .unwrap_or_else(|| OutputFormat::from_path(file));
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(file, format));
    TableWriter::new(format).write_to_path(&detection.result.table, &output_path)?;

    if !args.json {
        println!(
            "Found {} outliers in {} column(s), {} group(s)",
            report.total_outliers().to_string().white().bold(),
            report.totals.len(),
            report.groups_in_model
        );
        for totals in &report.totals {
            let line = format!(
                "  {:20} {:>8} members {:>6} outliers",
                totals.column, totals.members, totals.outliers
            );
            if totals.outliers > 0 {
                println!("{}", line.yellow());
            } else {
                println!("{}", line);
            }
            if totals.missing_group_rows > 0 {
                println!(
                    "  {:20} {:>8} rows of groups unknown to the model",
                    "", totals.missing_group_rows
                );
            }
        }
        if verbose {
            println!();
            println!("{}", "Groups with outliers:".yellow().bold());
            for group in &report.groups_with_outliers {
                println!(
                    "  {:20} {:20} {:>6}/{:<6} [{}, {}]",
                    group.column,
                    group.group,
                    group.outliers,
                    group.members,
                    group.lower_bound.map_or("?".into(), |v| v.to_string()),
                    group.upper_bound.map_or("?".into(), |v| v.to_string()),
                );
            }
        }
        println!(
            "{} {}",
            "Saved to".green().bold(),
            output_path.display().to_string().white()
        );
    }

    match &args.summary {
        Some(path) => {
            TableWriter::new(OutputFormat::from_path(path))
                .write_to_path(&detection.result.summary, path)?;
            if !args.json {
                println!(
                    "{} {}",
                    "Summary saved to".green().bold(),
                    path.display().to_string().white()
                );
            }
        }
        None if !args.json => {
            println!();
            print!(
                "{}",
                TableWriter::new(OutputFormat::Tsv).render(&detection.result.summary)?
            );
        }
        None => {}
    }

    print_warnings(&detection.result.warnings);
    Ok(())
}

/// Print a statistics table to stdout or write it to a file.
fn write_table(table: &DataTable, warnings: &WarningLog, args: &TableOutputArgs) -> CommandResult {
    match &args.output {
        Some(path) => {
            let format = args.format.unwrap_or_else(|| OutputFormat::from_path(path));
            TableWriter::new(format).write_to_path(table, path)?;
            println!(
                "{} {}",
                "Saved to".green().bold(),
                path.display().to_string().white()
            );
        }
        None => {
            let format = args.format.unwrap_or(OutputFormat::Tsv);
            print!("{}", TableWriter::new(format).render(table)?);
        }
    }
    print_warnings(warnings);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tukey::{DetectionScope, ReplacementStrategy};

    #[test]
    fn test_treatment_flags_override() {
        let base = TreatmentOptions::new().with_scope(DetectionScope::UpperOnly);
        let args = TreatmentArgs {
            replacement: Some(ReplacementStrategy::ClampToBoundary),
            update_domain: true,
            ..TreatmentArgs::default()
        };
        let options = treatment_options(base, &args);
        assert_eq!(options.scope, DetectionScope::UpperOnly);
        assert_eq!(options.replacement, ReplacementStrategy::ClampToBoundary);
        assert!(options.update_domain);
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/data/weights.tsv"), OutputFormat::Tsv);
        assert_eq!(path, PathBuf::from("/data/weights.treated.tsv"));
    }
}
