// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the CSV file and the token rows handed to
// the model, plus the text steps on the way back.
//
// The pipeline flows in this order:
//
//   input.csv
//       │
//       ▼
//   CsvLoader          → reads rows, keeps every source column
//       │
//       ▼
//   NoteDataset        → in-memory table, tracks response/status
//       │
//       ▼
//   PromptBuilder      → template + budget-truncated note → token ids
//       │
//       ▼
//   BatchCollator      → left-pads a group into one PaddedBatch
//       │
//       ▼
//   (inference — Layer 5)
//       │
//       ▼
//   postprocess        → strip reasoning trace, score sections
//
// Each module is responsible for exactly one step.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Reads note tables (and previous outputs) from CSV
pub mod loader;

/// In-memory note table
pub mod dataset;

/// Token-budgeted prompt assembly
pub mod prompt;

/// Left-padding collation of prompt batches
pub mod batcher;

/// Reasoning-trace removal and section validation
pub mod postprocess;
