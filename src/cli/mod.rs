// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built on `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `run`     — extract summaries for every pending row,
//                  resuming from an existing output table
//   2. `summary` — print status counts of an output table
//
// Row-level failures never change the exit code; they are
// listed in the error report instead.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, RunArgs, SummaryArgs};

use crate::infra::metrics::StatusCounts;

#[derive(Parser, Debug)]
#[command(
    name = "med-note-extract",
    version,
    about = "Extract structured clinical summaries from free-text notes with a local LLM."
)]
pub struct Cli {
    /// The subcommand to run (run or summary)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args)     => run_extract(args),
            Commands::Summary(args) => run_summary(args),
        }
    }
}

/// Handles the `run` subcommand.
fn run_extract(args: RunArgs) -> Result<()> {
    use crate::application::extract_use_case::ExtractUseCase;

    tracing::info!("Starting extraction for rows in: {}", args.input);

    let errors_path = args.errors.clone();
    let summary = ExtractUseCase::new(args.into()).execute()?;

    println!(
        "Done: {} rows attempted in {} groups, {:.2}s.",
        summary.attempted,
        summary.groups,
        summary.elapsed.as_secs_f64()
    );
    print_counts(&summary.counts);
    if summary.truncated > 0 {
        println!("{} prompts were truncated to fit the token limits", summary.truncated);
    }
    if summary.errors > 0 {
        println!("{} rows failed, see {}", summary.errors, errors_path);
    }
    Ok(())
}

/// Handles the `summary` subcommand.
fn run_summary(args: SummaryArgs) -> Result<()> {
    use crate::application::summary_use_case::SummaryUseCase;

    let counts = SummaryUseCase::new(&args.output).execute()?;
    print_counts(&counts);
    Ok(())
}

fn print_counts(c: &StatusCounts) {
    println!(
        "FULL {} | PARTIAL {} | FAIL {} | ERROR {} | unprocessed {}",
        c.full, c.partial, c.fail, c.error, c.unprocessed
    );
}
