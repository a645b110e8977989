//! Summary command - show the intervals of a stored model.

use std::path::PathBuf;

use colored::Colorize;
use tukey::IntervalModel;

use super::CommandResult;

pub fn run(model_path: PathBuf, json_output: bool, verbose: bool) -> CommandResult {
    if !model_path.exists() {
        return Err(format!("Model file not found: {}", model_path.display()).into());
    }
    let model = IntervalModel::load(&model_path)?;

    if json_output {
        let groups: Vec<serde_json::Value> = model
            .groups()
            .map(|(key, intervals)| {
                let intervals: serde_json::Map<String, serde_json::Value> = intervals
                    .iter()
                    .map(|(column, interval)| {
                        (
                            column.clone(),
                            serde_json::json!({ "lower": interval.lower, "upper": interval.upper }),
                        )
                    })
                    .collect();
                Ok(serde_json::json!({
                    "group": serde_json::to_value(key.cells())?,
                    "intervals": intervals,
                }))
            })
            .collect::<Result<_, serde_json::Error>>()?;
        let summary = serde_json::json!({
            "outlier_columns": model.outlier_column_names(),
            "group_columns": model.group_column_names(),
            "groups": groups,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Interval model".cyan().bold(),
        model_path.display().to_string().white()
    );
    println!(
        "Outlier columns: {}",
        model.outlier_column_names().join(", ").white().bold()
    );
    let groups = model.group_column_names();
    if groups.is_empty() {
        println!("Group columns:   {}", "none".dimmed());
    } else {
        println!("Group columns:   {}", groups.join(", ").white().bold());
    }
    println!("Groups:          {}", model.group_count());

    if verbose || model.group_count() <= 50 {
        println!();
        for (key, intervals) in model.groups() {
            let label = if key.is_empty() { "(all rows)".to_string() } else { key.to_string() };
            println!("{}", label.yellow());
            for (column, interval) in intervals {
                println!("  {:20} [{}, {}]", column, interval.lower, interval.upper);
            }
        }
    } else {
        println!("Use {} to list every group", "--verbose".cyan());
    }
    Ok(())
}
