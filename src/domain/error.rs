// ============================================================
// Layer 3 — Error Types
// ============================================================
// Typed failures at the two seams where the run loop has to tell
// a fatal problem apart from a recoverable one.

use thiserror::Error;

/// Raised while assembling prompts.
#[derive(Error, Debug)]
pub enum PromptError {
    /// The fixed template leaves no room for the note body.
    /// Fatal: no prompt can be built for any record.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tokenisation error: {0}")]
    Tokenize(String),
}

/// Result of one batched completion call. Always caught per group.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Cannot connect to inference server at {0}")]
    Connection(String),

    #[error("Inference request failed: {0}")]
    Http(String),

    #[error("Inference server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Cannot parse inference response: {0}")]
    ResponseParsing(String),

    #[error("Expected {expected} generated sequences, got {actual}")]
    Cardinality { expected: usize, actual: usize },

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Decode error: {0}")]
    Decode(String),
}
