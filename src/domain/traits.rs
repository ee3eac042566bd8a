// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The batch loop never talks to a concrete tokenizer or model.
// It is handed implementations of these traits at construction
// time, so tests can drive the whole pipeline with stubs:
//   - TokenCodec       → HfTokenizer (tokenizer.json) or a test stub
//   - InferenceService → LlamaServerClient or a test stub
//   - PostBatchHook    → Cooldown or nothing at all
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Trait Objects)

use anyhow::Result;

use crate::domain::error::InferenceError;

// ─── TokenCodec ───────────────────────────────────────────────────────────────
/// Text ⇄ token-id conversion for one model vocabulary.
pub trait TokenCodec {
    /// Encode without adding special tokens
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode, skipping special tokens
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Id used to left-pad prompt rows
    fn pad_token_id(&self) -> u32;

    /// End-of-sequence id, also handed to the model as its pad id
    fn eos_token_id(&self) -> u32;
}

// ─── InferenceService ─────────────────────────────────────────────────────────
/// Everything the completion call needs for one batch.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Left-padded token rows, all of one width
    pub input_ids: &'a [Vec<u32>],

    /// 1 for real tokens, 0 for padding, same shape as input_ids
    pub attention_mask: &'a [Vec<u32>],

    pub max_new_tokens: usize,

    /// Always false for extraction: greedy decoding only
    pub do_sample: bool,

    /// The model pads finished rows with this id (the EOS id)
    pub pad_token_id: u32,
}

/// A text-completion capability over token sequences.
///
/// Returns one row per input row; each returned row starts with
/// the submitted (padded) input row, followed by the new tokens.
pub trait InferenceService {
    fn generate(&mut self, request: &GenerationRequest<'_>)
        -> std::result::Result<Vec<Vec<u32>>, InferenceError>;
}

// ─── PostBatchHook ────────────────────────────────────────────────────────────
/// Resource-management callback run after every group.
/// Nothing about correctness may depend on it.
pub trait PostBatchHook {
    fn after_batch(&mut self, batch_no: usize);
}
