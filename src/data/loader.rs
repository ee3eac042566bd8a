// ============================================================
// Layer 4 — Table Loader
// ============================================================
// Reads the note table from CSV and, on restart, folds an
// earlier output table back into it.
//
// Input:  any CSV with a header row and a `patient_condition`
//         column. Every other column is carried through.
// Resume: the output table written by a previous run. Its
//         `response` / `status` cells are copied onto the input
//         rows by position; rows with a non-empty response are
//         then skipped by the runner.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::data::dataset::{NoteDataset, CONDITION_COLUMN, RESPONSE_COLUMN, STATUS_COLUMN};
use crate::domain::record::{Record, Status};

/// Loads note tables from CSV files.
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the source table.
    ///
    /// If the file already has `response` / `status` columns (an
    /// output table fed back in as input) they are lifted out of the
    /// source columns and become the records' prior state.
    pub fn load(&self) -> Result<NoteDataset> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Cannot open input table '{}'", self.path.display()))?;

        let all_headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Cannot read header row of '{}'", self.path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let response_col = column(&all_headers, RESPONSE_COLUMN);
        let status_col   = column(&all_headers, STATUS_COLUMN);
        let keep: Vec<usize> = (0..all_headers.len())
            .filter(|&i| Some(i) != response_col && Some(i) != status_col)
            .collect();
        let headers: Vec<String> = keep.iter().map(|&i| all_headers[i].clone()).collect();

        let Some(condition_col) = column(&headers, CONDITION_COLUMN) else {
            bail!(
                "Input table '{}' has no '{}' column (found: {})",
                self.path.display(),
                CONDITION_COLUMN,
                all_headers.join(", ")
            );
        };

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.with_context(|| {
                format!("Malformed row {} in '{}'", index + 1, self.path.display())
            })?;

            let fields: Vec<String> = keep
                .iter()
                .map(|&i| row.get(i).unwrap_or_default().to_string())
                .collect();
            let condition = fields[condition_col].clone();

            let mut record = Record::new(index, fields, condition);
            if let Some(c) = response_col {
                record.response = row.get(c).unwrap_or_default().to_string();
            }
            if let Some(c) = status_col {
                record.status = parse_status(row.get(c).unwrap_or_default(), index);
            }
            records.push(record);
        }

        tracing::info!("Loaded {} rows from '{}'", records.len(), self.path.display());
        Ok(NoteDataset::new(headers, records))
    }
}

/// Copy `response` / `status` from a previous run's output table
/// onto `dataset`, row by row. Returns how many rows came back
/// already processed. A missing file means a fresh run.
pub fn overlay_prior_output(dataset: &mut NoteDataset, path: &Path) -> Result<usize> {
    if !path.exists() {
        tracing::debug!("No previous output at '{}', starting fresh", path.display());
        return Ok(0);
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Cannot open previous output '{}'", path.display()))?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let Some(response_col) = column(&headers, RESPONSE_COLUMN) else {
        bail!("Previous output '{}' has no '{}' column", path.display(), RESPONSE_COLUMN);
    };
    let status_col = column(&headers, STATUS_COLUMN);

    let mut rows = 0usize;
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| {
            format!("Malformed row {} in '{}'", index + 1, path.display())
        })?;
        rows += 1;

        let Some(record) = dataset.get_mut(index) else {
            continue;
        };
        record.response = row.get(response_col).unwrap_or_default().to_string();
        record.status   = status_col
            .map(|c| parse_status(row.get(c).unwrap_or_default(), index))
            .unwrap_or_default();
    }

    if rows != dataset.len() {
        tracing::warn!(
            "Previous output has {} rows but the input has {}; matched by position",
            rows,
            dataset.len()
        );
    }

    let processed = dataset.processed_count();
    println!("Found {} already processed rows, they will be skipped.", processed);
    Ok(processed)
}

fn column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn parse_status(cell: &str, index: usize) -> Status {
    cell.parse().unwrap_or_else(|e| {
        tracing::warn!("Row {}: {}; treating status as empty", index, e);
        Status::Unprocessed
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn test_load_keeps_all_source_columns() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "in.csv", "id,patient_condition\n7,\"空腹血糖 7.2, 餐后 9.1\"\n8,血压 130/85\n");

        let t = CsvLoader::new(&p).load().unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.headers(), &["id".to_string(), "patient_condition".to_string()]);
        assert_eq!(t.get(0).unwrap().patient_condition, "空腹血糖 7.2, 餐后 9.1");
        assert_eq!(t.get(1).unwrap().fields, vec!["8", "血压 130/85"]);
        assert_eq!(t.pending_indices(), vec![0, 1]);
    }

    #[test]
    fn test_missing_condition_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "in.csv", "id,notes\n1,x\n");
        assert!(CsvLoader::new(&p).load().is_err());
    }

    #[test]
    fn test_output_table_as_input_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let p   = write(dir.path(), "in.csv", "patient_condition,response,status\na,done,FULL\nb,,\n");

        let t = CsvLoader::new(&p).load().unwrap();
        assert_eq!(t.headers(), &["patient_condition".to_string()]);
        assert_eq!(t.get(0).unwrap().status, Status::Full);
        assert_eq!(t.pending_indices(), vec![1]);
    }

    #[test]
    fn test_overlay_marks_rows_processed() {
        let dir   = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "in.csv", "patient_condition\na\nb\nc\n");
        let prior = write(
            dir.path(),
            "out.csv",
            "patient_condition,response,status\na,summary,PARTIAL_2\nb,,\nc,[ERROR] boom,ERROR\n",
        );

        let mut t = CsvLoader::new(&input).load().unwrap();
        let n     = overlay_prior_output(&mut t, &prior).unwrap();

        assert_eq!(n, 2);
        assert_eq!(t.pending_indices(), vec![1]);
        assert_eq!(t.get(0).unwrap().status, Status::Partial(2));
        assert_eq!(t.get(2).unwrap().status, Status::Error);
    }

    #[test]
    fn test_overlay_without_file_is_fresh_run() {
        let dir   = tempfile::tempdir().unwrap();
        let input = write(dir.path(), "in.csv", "patient_condition\na\n");
        let mut t = CsvLoader::new(&input).load().unwrap();
        assert_eq!(overlay_prior_output(&mut t, &dir.path().join("nope.csv")).unwrap(), 0);
    }
}
