// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `run` and `summary`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, u64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::extract_use_case::ExtractConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract structured summaries from every pending row
    Run(RunArgs),

    /// Count statuses in an existing output table
    Summary(SummaryArgs),
}

/// All arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input CSV with a `patient_condition` column
    #[arg(long, default_value = "input/joined_condition.csv")]
    pub input: String,

    /// Output CSV; also the resume point of an interrupted run
    #[arg(long, default_value = "output/notes_extracted.csv")]
    pub output: String,

    /// Error report CSV (index, prompt, error)
    #[arg(long, default_value = "output/errors.csv")]
    pub errors: String,

    /// Model directory or tokenizer.json path
    #[arg(long, default_value = "model")]
    pub tokenizer: String,

    /// JSON file with `system`, `prefix` and `suffix` to replace
    /// the built-in clinical template
    #[arg(long)]
    pub template: Option<String>,

    /// End-of-sequence token of the model
    #[arg(long, default_value = "<｜end▁of▁sentence｜>")]
    pub eos_token: String,

    /// Pad token; the EOS token is used when absent
    #[arg(long)]
    pub pad_token: Option<String>,

    /// Base URL of the local completion server
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub server_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Token budget for the whole prompt (template + note)
    #[arg(long, default_value_t = 8000)]
    pub max_input_tokens: usize,

    /// Absolute context window of the model
    #[arg(long, default_value_t = 16384)]
    pub context_window: usize,

    /// Tokens generated per row
    #[arg(long, default_value_t = 2048)]
    pub max_new_tokens: usize,

    /// Rows per generation call
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: u64,

    /// Save the output table after every N groups
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub checkpoint_every: u64,

    /// Section headers required for FULL (2 to 4; fewer than 2 is always FAIL)
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(2..=4))]
    pub min_sections: u64,

    /// Pause after each group, in milliseconds (0 disables)
    #[arg(long, default_value_t = 1000)]
    pub cooldown_ms: u64,
}

/// Convert CLI RunArgs into the application-layer ExtractConfig.
/// The application layer never sees clap types.
impl From<RunArgs> for ExtractConfig {
    fn from(a: RunArgs) -> Self {
        ExtractConfig {
            input:            a.input,
            output:           a.output,
            errors:           a.errors,
            tokenizer:        a.tokenizer,
            template:         a.template,
            eos_token:        a.eos_token,
            pad_token:        a.pad_token,
            server_url:       a.server_url,
            timeout_secs:     a.timeout_secs,
            max_input_tokens: a.max_input_tokens,
            context_window:   a.context_window,
            max_new_tokens:   a.max_new_tokens,
            batch_size:       a.batch_size as usize,
            checkpoint_every: a.checkpoint_every as usize,
            min_sections:     a.min_sections as usize,
            cooldown_ms:      a.cooldown_ms,
        }
    }
}

/// All arguments for the `summary` command
#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Output CSV written by `run`
    #[arg(long, default_value = "output/notes_extracted.csv")]
    pub output: String,
}
