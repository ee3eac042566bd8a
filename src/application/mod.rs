// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (an extraction run, or a status summary).
//
// Rules for this layer:
//   - No tokenizer or HTTP details here
//   - No direct CSV parsing (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The group-by-group extraction loop
pub mod batch_runner;

// Wires config, tokenizer, backend and stores for a run
pub mod extract_use_case;

// Status counts of an existing output table
pub mod summary_use_case;
