// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records run progress to a CSV file after each group.
//
// Metrics recorded per group:
//   - batch:        group number within this run (1, 2, 3, ...)
//   - completed:    rows attempted so far, including resumed ones
//   - total:        rows in the table
//   - elapsed_secs: wall time since the run started
//   - full/partial/fail/error: status counts over the table
//
// Output file: <output dir>/progress.csv, appended across runs
// so resumed runs keep one continuous log.
//
// Example CSV output:
//   batch,completed,total,elapsed_secs,full,partial,fail,error
//   1,8,120,41.203000,7,1,0,0
//   2,16,120,83.911000,14,1,1,0

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use crate::data::dataset::NoteDataset;
use crate::domain::record::Status;

/// Status counts over a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub full:        usize,
    pub partial:     usize,
    pub fail:        usize,
    pub error:       usize,
    pub unprocessed: usize,
}

impl StatusCounts {
    pub fn of(table: &NoteDataset) -> Self {
        let mut c = Self::default();
        for r in table.records() {
            match r.status {
                Status::Full       => c.full += 1,
                Status::Partial(_) => c.partial += 1,
                Status::Fail       => c.fail += 1,
                Status::Error      => c.error += 1,
                Status::Unprocessed => c.unprocessed += 1,
            }
        }
        c
    }
}

/// One row of progress data for a single group
#[derive(Debug, Clone)]
pub struct BatchMetrics {
    pub batch:        usize,
    pub completed:    usize,
    pub total:        usize,
    pub elapsed_secs: f64,
    pub counts:       StatusCounts,
}

/// Appends per-group metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(&dir)?;
        }

        let csv_path = dir.join("progress.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "batch,completed,total,elapsed_secs,full,partial,fail,error")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one group's metrics as a new row
    pub fn log(&self, m: &BatchMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{},{:.6},{},{},{},{}",
            m.batch,
            m.completed,
            m.total,
            m.elapsed_secs,
            m.counts.full,
            m.counts.partial,
            m.counts.fail,
            m.counts.error,
        )?;
        Ok(())
    }
}
