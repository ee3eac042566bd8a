// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the model's HuggingFace `tokenizer.json` and resolves
// the special tokens the batch needs:
//   - pad id → left-padding the prompt rows
//   - eos id → the id the model pads finished rows with
//
// If no pad token is configured (or the vocabulary lacks it),
// the EOS token doubles as pad, as causal LMs usually do.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::domain::traits::TokenCodec;

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    /// `path` may be the tokenizer.json itself or the model directory holding it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let path = if path.is_dir() { path.join("tokenizer.json") } else { path };
        Self { path }
    }

    /// Load the tokenizer and resolve its special token ids
    pub fn load(&self, eos_token: &str, pad_token: Option<&str>) -> Result<HfTokenizer> {
        let tokenizer = Tokenizer::from_file(&self.path).map_err(|e| {
            anyhow!("Cannot load tokenizer from '{}': {}", self.path.display(), e)
        })?;
        HfTokenizer::new(tokenizer, eos_token, pad_token)
            .with_context(|| format!("Tokenizer '{}'", self.path.display()))
    }
}

/// A HuggingFace tokenizer with its pad / eos ids resolved.
pub struct HfTokenizer {
    inner:  Tokenizer,
    pad_id: u32,
    eos_id: u32,
}

impl HfTokenizer {
    pub fn new(inner: Tokenizer, eos_token: &str, pad_token: Option<&str>) -> Result<Self> {
        let eos_id = inner
            .token_to_id(eos_token)
            .ok_or_else(|| anyhow!("EOS token '{eos_token}' is not in the vocabulary"))?;

        let pad_id = match pad_token.and_then(|t| inner.token_to_id(t)) {
            Some(id) => id,
            None => {
                if let Some(t) = pad_token {
                    tracing::warn!("Pad token '{t}' not in vocabulary, padding with EOS");
                }
                eos_id
            }
        };

        tracing::info!("Tokenizer ready: pad_id={}, eos_id={}", pad_id, eos_id);
        Ok(Self { inner, pad_id, eos_id })
    }
}

impl TokenCodec for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| anyhow!("Decode error: {e}"))
    }

    fn pad_token_id(&self) -> u32 { self.pad_id }

    fn eos_token_id(&self) -> u32 { self.eos_id }
}
