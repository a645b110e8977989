//! Correlate command - rank correlation between numeric columns.

use std::path::PathBuf;

use colored::Colorize;
use tukey::stats::{correlation_matrix, CorrelationMethod, PValueAlternative};
use tukey::{ExecutionContext, Parser};

use super::{columns_or_numeric, write_table, CommandResult};
use crate::cli::TableOutputArgs;

pub fn run(
    file: PathBuf,
    columns: Vec<String>,
    method: CorrelationMethod,
    alternative: PValueAlternative,
    output: TableOutputArgs,
    ctx: &ExecutionContext,
) -> CommandResult {
    if !file.exists() {
        return Err(format!("File not found: {}", file.display()).into());
    }
    let (table, _) = Parser::new().parse_file(&file)?;
    let columns = columns_or_numeric(&table, columns);

    eprintln!(
        "{} {} over {} columns",
        "Computing".cyan().bold(),
        method.to_string().white(),
        columns.len()
    );
    let matrix = correlation_matrix(&table, &columns, method, alternative, ctx)?;
    write_table(&matrix.to_table(), &matrix.warnings, &output)
}
