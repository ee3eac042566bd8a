// ============================================================
// Layer 2 — SummaryUseCase
// ============================================================
// Reads an output table and counts its statuses.
// No model, tokenizer or server involved.

use anyhow::Result;

use crate::data::loader::CsvLoader;
use crate::infra::metrics::StatusCounts;

/// Counts statuses in an existing output table.
pub struct SummaryUseCase {
    output: String,
}

impl SummaryUseCase {
    pub fn new(output: impl Into<String>) -> Self {
        Self { output: output.into() }
    }

    pub fn execute(&self) -> Result<StatusCounts> {
        // An output table loads like an input whose response/status
        // columns are already filled in
        let table = CsvLoader::new(&self.output).load()?;
        Ok(StatusCounts::of(&table))
    }
}
