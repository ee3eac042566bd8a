// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums, and traits that define what a
// note-extraction run works with.
//
// Rules for this layer:
//   - NO file I/O or network calls
//   - NO tokenizer or HTTP client types
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A table row, its status, and error-report rows
pub mod record;

// Prompt and inference failures
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
