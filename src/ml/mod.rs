// ============================================================
// Layer 5 — Inference Layer
// ============================================================
// The only layer that talks to a language model.
//
// The model itself is an external capability: a completion
// service that takes token rows and returns token rows. This
// layer wraps that call so the run loop sees one function,
//   prompts → Result<cleaned texts, InferenceError>
//
//   inferencer.rs   — collate, call, slice, decode, clean
//
//   llama_server.rs — InferenceService over a local
//                     llama.cpp-compatible HTTP server
//
// Reference: Rust Book §17 (Trait Objects)

/// Batch generation wrapper around any InferenceService
pub mod inferencer;

/// HTTP client for a locally hosted completion server
pub mod llama_server;
