//! Tukey CLI - outlier detection and rank statistics for tabular data.

mod cli;
mod commands;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cli::{Cli, Commands};
use tukey::ExecutionContext;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "tukey=debug" } else { "tukey=warn" };
    tukey::logging::init_tracing_with(filter, cli.json_log);

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("could not install the Ctrl-C handler: {}", e);
    }
    let ctx = ExecutionContext::new().with_cancel_flag(cancelled);

    let result = match cli.command {
        Commands::Detect {
            file,
            config,
            columns,
            groups,
            multiplier,
            estimation,
            method,
            partitions,
            save_model,
            treatment,
            output,
        } => commands::detect::run(
            commands::detect::DetectArgs {
                file,
                config,
                columns,
                groups,
                multiplier,
                estimation,
                method,
                partitions,
                save_model,
                treatment,
                output,
            },
            &ctx,
            cli.verbose,
        ),

        Commands::Apply {
            file,
            model,
            treatment,
            output,
        } => commands::apply::run(file, model, treatment, output, &ctx, cli.verbose),

        Commands::Summary { model, json } => commands::summary::run(model, json, cli.verbose),

        Commands::Correlate {
            file,
            columns,
            method,
            alternative,
            output,
        } => commands::correlate::run(file, columns, method, alternative, output, &ctx),

        Commands::Friedman {
            file,
            columns,
            alpha,
            output,
        } => commands::friedman::run(file, columns, alpha, output, &ctx),

        Commands::Normality {
            file,
            columns,
            alpha,
            francia,
            output,
        } => commands::normality::run(file, columns, alpha, francia, output, &ctx),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
