// ============================================================
// Layer 2 — ExtractUseCase
// ============================================================
// Wires the layers together for one extraction run:
//
//   Step 1: Load the prompt template         (Layer 4 - data)
//   Step 2: Load the tokenizer               (Layer 6 - infra)
//   Step 3: Pre-tokenise the template        (Layer 4 - data)
//           → fails here, before any row, if the template
//             alone does not fit the input budget
//   Step 4: Load input, fold in prior output (Layer 4 - data)
//   Step 5: Save config snapshot             (Layer 6 - infra)
//   Step 6: Connect the inference backend    (Layer 5 - ml)
//   Step 7: Run the batch loop               (Layer 2 - runner)
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::application::batch_runner::{BatchRunner, RunSummary, RunnerConfig};
use crate::data::{
    loader::{overlay_prior_output, CsvLoader},
    prompt::{PromptBuilder, PromptLimits, PromptTemplate},
};
use crate::infra::{
    checkpoint::TableStore,
    cooldown::Cooldown,
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::llama_server::LlamaServerClient;

// ─── Run Configuration ───────────────────────────────────────────────────────
// Everything one run needs. Serialisable so the exact settings
// are kept next to the output they produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub input:            String,
    pub output:           String,
    pub errors:           String,
    pub tokenizer:        String,
    pub template:         Option<String>,
    pub eos_token:        String,
    pub pad_token:        Option<String>,
    pub server_url:       String,
    pub timeout_secs:     u64,
    pub max_input_tokens: usize,
    pub context_window:   usize,
    pub max_new_tokens:   usize,
    pub batch_size:       usize,
    pub checkpoint_every: usize,
    pub min_sections:     usize,
    pub cooldown_ms:      u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input:            "input/joined_condition.csv".to_string(),
            output:           "output/notes_extracted.csv".to_string(),
            errors:           "output/errors.csv".to_string(),
            tokenizer:        "model".to_string(),
            template:         None,
            eos_token:        "<｜end▁of▁sentence｜>".to_string(),
            pad_token:        None,
            server_url:       "http://127.0.0.1:8080".to_string(),
            timeout_secs:     600,
            max_input_tokens: 8000,
            context_window:   16384,
            max_new_tokens:   2048,
            batch_size:       8,
            checkpoint_every: 1,
            min_sections:     4,
            cooldown_ms:      1000,
        }
    }
}

impl ExtractConfig {
    pub fn prompt_limits(&self) -> PromptLimits {
        PromptLimits {
            max_input_tokens: self.max_input_tokens,
            context_window:   self.context_window,
            max_new_tokens:   self.max_new_tokens,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            batch_size:       self.batch_size,
            checkpoint_every: self.checkpoint_every,
            min_sections:     self.min_sections,
            max_new_tokens:   self.max_new_tokens,
        }
    }
}

// ─── ExtractUseCase ──────────────────────────────────────────────────────────
pub struct ExtractUseCase {
    config: ExtractConfig,
}

impl ExtractUseCase {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 1: Prompt template ──────────────────────────────────────────
        let template = match &cfg.template {
            Some(path) => PromptTemplate::from_json_file(Path::new(path))?,
            None       => PromptTemplate::default(),
        };

        // ── Step 2: Tokenizer ────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.tokenizer)
            .load(&cfg.eos_token, cfg.pad_token.as_deref())?;

        // ── Step 3: Pre-tokenised template (fatal if oversized) ──────────────
        let builder = PromptBuilder::new(&template, &tokenizer, cfg.prompt_limits())?;
        tracing::info!(
            "Prompt budget: {} body tokens of {} total",
            builder.available_budget(),
            cfg.max_input_tokens
        );

        // ── Step 4: Input table, resumed from a previous output ──────────────
        let mut table = CsvLoader::new(&cfg.input).load()?;
        overlay_prior_output(&mut table, Path::new(&cfg.output))?;

        // ── Step 5: Output locations + config snapshot ───────────────────────
        let store = TableStore::new(&cfg.output, &cfg.errors)?;
        store.save_config(cfg)?;
        let metrics = MetricsLogger::new(store.output_dir())
            .context("Cannot set up progress log")?;

        // ── Step 6: Inference backend ────────────────────────────────────────
        let mut service  = LlamaServerClient::new(&cfg.server_url, cfg.timeout_secs)?;
        let mut cooldown = Cooldown::new(Duration::from_millis(cfg.cooldown_ms));
        tracing::info!("Using inference server at {}", cfg.server_url);

        // ── Step 7: Batch loop ───────────────────────────────────────────────
        BatchRunner::new(cfg.runner_config(), &builder, &tokenizer, &mut service, &store)
            .with_hook(&mut cooldown)
            .with_metrics(metrics)
            .run(&mut table)
    }
}
