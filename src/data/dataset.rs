// ============================================================
// Layer 4 — Note Dataset
// ============================================================
// In-memory note table: source columns plus the response and
// status tracked on each record. Written back out as the
// output table by the checkpoint store.

use crate::domain::record::{Record, Status};

/// Column holding the free-text note
pub const CONDITION_COLUMN: &str = "patient_condition";
/// Output column with the generated summary
pub const RESPONSE_COLUMN:  &str = "response";
/// Output column with the completion status
pub const STATUS_COLUMN:    &str = "status";

/// The in-memory note table, mutated in place as groups finish.
///
/// `headers` are the source columns; `response` and `status` are
/// tracked on each record and appended when the table is written.
#[derive(Debug, Clone, Default)]
pub struct NoteDataset {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl NoteDataset {
    pub fn new(headers: Vec<String>, records: Vec<Record>) -> Self {
        Self { headers, records }
    }

    pub fn headers(&self) -> &[String] { &self.headers }

    pub fn records(&self) -> &[Record] { &self.records }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }

    /// Indices of records with no response yet, in table order
    pub fn pending_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .filter(|r| !r.is_processed())
            .map(|r| r.index)
            .collect()
    }

    pub fn processed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_processed()).count()
    }

    /// Write a result into the record at `index`
    pub fn set_result(&mut self, index: usize, response: impl Into<String>, status: Status) {
        if let Some(r) = self.records.get_mut(index) {
            r.response = response.into();
            r.status   = status;
        }
    }

    /// Header row of the output table: source columns + response + status
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        headers.push(RESPONSE_COLUMN.to_string());
        headers.push(STATUS_COLUMN.to_string());
        headers
    }

    /// One output row per record, aligned with `output_headers()`
    pub fn output_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.records.iter().map(|r| {
            let mut row = r.fields.clone();
            row.resize(self.headers.len(), String::new());
            row.push(r.response.clone());
            row.push(r.status.to_string());
            row
        })
    }
}
