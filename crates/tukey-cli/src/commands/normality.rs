//! Normality command - Shapiro-Wilk (or Shapiro-Francia) test per column.

use std::path::PathBuf;

use colored::Colorize;
use tukey::stats::normality_tests;
use tukey::{ExecutionContext, Parser};

use super::{columns_or_numeric, write_table, CommandResult};
use crate::cli::TableOutputArgs;

pub fn run(
    file: PathBuf,
    columns: Vec<String>,
    alpha: f64,
    francia: bool,
    output: TableOutputArgs,
    ctx: &ExecutionContext,
) -> CommandResult {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }
    let (table, _) = Parser::new().parse_file(&file)?;
    let columns = columns_or_numeric(&table, columns);

    let report = normality_tests(&table, &columns, alpha, francia, ctx)?;
    let rejected = report.results.iter().filter(|r| r.reject).count();
    eprintln!(
        "{} of {} columns deviate from normality at alpha = {}",
        if rejected > 0 {
            rejected.to_string().red().bold()
        } else {
            rejected.to_string().green().bold()
        },
        report.results.len(),
        alpha
    );
    write_table(&report.to_table(), &report.warnings, &output)
}
