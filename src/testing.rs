// ============================================================
// Test Support
// ============================================================
// Test doubles shared by the unit tests of several layers.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::domain::error::InferenceError;
use crate::domain::traits::{GenerationRequest, InferenceService, TokenCodec};

pub const PAD_ID: u32 = 0;
pub const EOS_ID: u32 = 1;

/// One token per `char`: the token id is the code point.
/// Lengths in tokens equal `text.chars().count()`, which keeps
/// budget arithmetic in tests easy to read.
pub struct CharCodec;

impl TokenCodec for CharCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.chars().map(|c| c as u32).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        ids.iter()
            .filter(|&&id| id != PAD_ID && id != EOS_ID)
            .map(|&id| char::from_u32(id).ok_or_else(|| anyhow!("bad id {id}")))
            .collect()
    }

    fn pad_token_id(&self) -> u32 { PAD_ID }

    fn eos_token_id(&self) -> u32 { EOS_ID }
}

pub fn encode(text: &str) -> Vec<u32> {
    text.chars().map(|c| c as u32).collect()
}

/// Scripted completion service: each call pops the next outcome.
/// `Ok(texts)` are appended to the submitted rows one per row;
/// `Err(msg)` fails the whole call.
pub struct ScriptedService {
    pub script: VecDeque<std::result::Result<Vec<String>, String>>,
    pub calls:  usize,
    pub widths: Vec<usize>,
}

impl ScriptedService {
    pub fn new(script: Vec<std::result::Result<Vec<String>, String>>) -> Self {
        Self { script: script.into(), calls: 0, widths: Vec::new() }
    }
}

impl InferenceService for ScriptedService {
    fn generate(&mut self, request: &GenerationRequest<'_>)
        -> std::result::Result<Vec<Vec<u32>>, InferenceError>
    {
        self.calls += 1;
        self.widths.push(request.input_ids.first().map_or(0, Vec::len));
        match self.script.pop_front() {
            Some(Ok(texts)) => Ok(request
                .input_ids
                .iter()
                .zip(texts.iter())
                .map(|(row, text)| {
                    let mut out = row.clone();
                    out.extend(encode(text));
                    out.push(EOS_ID);
                    out
                })
                .collect()),
            Some(Err(msg)) => Err(InferenceError::Http(msg)),
            None => Err(InferenceError::Http("script exhausted".to_string())),
        }
    }
}

/// Answers every row with the same text, counting calls.
pub struct EchoService {
    pub reply: String,
    pub calls: usize,
}

impl EchoService {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), calls: 0 }
    }
}

impl InferenceService for EchoService {
    fn generate(&mut self, request: &GenerationRequest<'_>)
        -> std::result::Result<Vec<Vec<u32>>, InferenceError>
    {
        self.calls += 1;
        Ok(request
            .input_ids
            .iter()
            .map(|row| {
                let mut out = row.clone();
                out.extend(encode(&self.reply));
                out
            })
            .collect())
    }
}

/// A reply that contains all four required section headers
pub fn full_template_reply() -> String {
    "<think>先看血糖</think>\n\n\
     1. **血糖控制**\n- 空腹血糖波动情况：7.2\n- 餐后血糖波动情况：9.1\n- 症状：未提及\n\
     2. **血压管理**\n130/85\n\
     3. **依从性与监测问题**\n- 依从性：未提及\n- 用药情况：未提及\n\
     4. **生活方式**\n- 饮食：未提及\n- 运动：未提及\n- 体重变化：未提及\n"
        .to_string()
}
