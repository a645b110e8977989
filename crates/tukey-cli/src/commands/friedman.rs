//! Friedman command - rank test over three or more related columns.

use std::path::PathBuf;

use colored::Colorize;
use tukey::stats::friedman_test;
use tukey::{ExecutionContext, Parser};

use super::{columns_or_numeric, write_table, CommandResult};
use crate::cli::TableOutputArgs;

pub fn run(
    file: PathBuf,
    columns: Vec<String>,
    alpha: f64,
    output: TableOutputArgs,
    ctx: &ExecutionContext,
) -> CommandResult {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }
    let (table, _) = Parser::new().parse_file(&file)?;
    let columns = columns_or_numeric(&table, columns);

    let result = friedman_test(&table, &columns, alpha, ctx)?;
    let verdict = if result.reject {
        "rejected".red().bold()
    } else {
        "not rejected".green().bold()
    };
    eprintln!(
        "Friedman ({}): H0 {} at alpha = {} (n = {}, df = {})",
        result.columns.join(", "),
        verdict,
        alpha,
        result.rows,
        result.degrees_of_freedom
    );
    write_table(&result.to_table(), &result.warnings, &output)
}
