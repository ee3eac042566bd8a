// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Durable writes of the run's outputs.
//
// What gets written:
//   1. output table (CSV)   — the full table, rewritten after
//                             every checkpoint interval
//   2. error report (CSV)   — index,prompt,error; end of run only
//   3. run_config.json      — the configuration of the run,
//                             written next to the output table
//
// Why rewrite the whole table instead of appending?
//   The runner mutates rows in place; a full rewrite keeps the
//   file a faithful copy of the in-memory table. The write goes
//   to a temporary sibling first and is renamed over the old
//   file, so a crash mid-write never leaves a truncated table.
//
// File layout:
//   output/
//     notes_extracted.csv   ← output table
//     errors.csv            ← error report (only if failures)
//     run_config.json       ← configuration snapshot
//     progress.csv          ← per-group metrics (infra::metrics)
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::dataset::NoteDataset;
use crate::domain::record::ErrorRecord;

/// Owns the output locations of one run.
pub struct TableStore {
    output_path: PathBuf,
    errors_path: PathBuf,
}

impl TableStore {
    /// Create a store; the output directory is created if needed
    pub fn new(output_path: impl Into<PathBuf>, errors_path: impl Into<PathBuf>) -> Result<Self> {
        let output_path = output_path.into();
        let errors_path = errors_path.into();

        for path in [&output_path, &errors_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
            }
        }

        Ok(Self { output_path, errors_path })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn errors_path(&self) -> &Path {
        &self.errors_path
    }

    /// Directory holding the output table (for side files)
    pub fn output_dir(&self) -> PathBuf {
        self.output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Rewrite the full output table.
    pub fn save_table(&self, table: &NoteDataset) -> Result<()> {
        let tmp = self.output_path.with_extension("csv.tmp");

        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("Cannot create '{}'", tmp.display()))?;
            writer.write_record(table.output_headers())?;
            for row in table.output_rows() {
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp, &self.output_path).with_context(|| {
            format!("Cannot move checkpoint into place at '{}'", self.output_path.display())
        })?;

        tracing::debug!(
            "Checkpoint: {} rows written to '{}'",
            table.len(),
            self.output_path.display()
        );
        Ok(())
    }

    /// Write the error report. Does nothing for an empty list.
    pub fn save_errors(&self, errors: &[ErrorRecord]) -> Result<()> {
        if errors.is_empty() {
            return Ok(());
        }

        let mut writer = csv::Writer::from_path(&self.errors_path)
            .with_context(|| format!("Cannot create error report '{}'", self.errors_path.display()))?;
        for e in errors {
            writer.serialize(e)?;
        }
        writer.flush()?;

        tracing::info!(
            "Wrote {} error records to '{}'",
            errors.len(),
            self.errors_path.display()
        );
        Ok(())
    }

    /// Snapshot the run configuration as pretty JSON
    pub fn save_config<C: Serialize>(&self, cfg: &C) -> Result<()> {
        let path = self.output_dir().join("run_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}
