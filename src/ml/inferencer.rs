// ============================================================
// Layer 5 — Inferencer
// ============================================================
// One blocking generation round for a whole group:
//
//   prompts ─► collate (left pad) ─► service.generate
//           ─► slice off the prompt ─► decode ─► strip </think>
//
// The service echoes each submitted row before its new tokens.
// Because rows are left-padded, a row's prompt ends at
//   padding + mask_row_sum
// which is the batch width for every row.
use crate::data::batcher::{BatchCollator, PaddedBatch};
use crate::data::postprocess::process_response;
use crate::domain::error::InferenceError;
use crate::domain::traits::{GenerationRequest, InferenceService, TokenCodec};

pub struct Inferencer<'a> {
    service:        &'a mut dyn InferenceService,
    codec:          &'a dyn TokenCodec,
    collator:       BatchCollator,
    max_new_tokens: usize,
}

impl<'a> Inferencer<'a> {
    pub fn new(
        service:        &'a mut dyn InferenceService,
        codec:          &'a dyn TokenCodec,
        max_new_tokens: usize,
    ) -> Self {
        let collator = BatchCollator::new(codec.pad_token_id());
        Self { service, codec, collator, max_new_tokens }
    }

    /// Generate cleaned text for every prompt, in order.
    pub fn generate(&mut self, prompts: Vec<Vec<u32>>) -> Result<Vec<String>, InferenceError> {
        let batch = self.collator.collate(prompts);
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerationRequest {
            input_ids:      &batch.input_ids,
            attention_mask: &batch.attention_mask,
            max_new_tokens: self.max_new_tokens,
            do_sample:      false,
            pad_token_id:   self.codec.eos_token_id(),
        };
        let outputs = self.service.generate(&request)?;

        if outputs.len() != batch.len() {
            return Err(InferenceError::Cardinality {
                expected: batch.len(),
                actual:   outputs.len(),
            });
        }

        generated_suffixes(&batch, &outputs)
            .into_iter()
            .map(|ids| -> Result<String, InferenceError> {
                let text = self
                    .codec
                    .decode(ids)
                    .map_err(|e| InferenceError::Decode(e.to_string()))?;
                Ok(process_response(&text))
            })
            .collect()
    }
}

/// The newly generated part of every output row.
fn generated_suffixes<'o>(batch: &PaddedBatch, outputs: &'o [Vec<u32>]) -> Vec<&'o [u32]> {
    let lengths  = batch.input_lengths();
    let paddings = batch.padding_lengths();

    outputs
        .iter()
        .enumerate()
        .map(|(i, out)| {
            let start = paddings[i] + lengths[i];
            out.get(start..).unwrap_or(&[])
        })
        .collect()
}
