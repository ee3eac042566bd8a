// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs      — Output table checkpoints, the error
//                        report, and the run-config snapshot.
//
//   tokenizer_store.rs — Loads the model's tokenizer.json and
//                        resolves pad / eos ids. Implements
//                        the TokenCodec trait.
//
//   metrics.rs         — Per-group progress log (CSV) and
//                        status counts.
//
//   cooldown.rs        — Post-batch delay hook.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Output table checkpoints and error report
pub mod checkpoint;

/// Tokenizer loading
pub mod tokenizer_store;

/// Progress metrics CSV logger
pub mod metrics;

/// Delay between groups
pub mod cooldown;
