// ============================================================
// Layer 4 — Prompt Builder
// ============================================================
// Turns one raw clinical note into a token sequence that fits
// the model's input budget.
//
// Sequence layout (fixed order):
//
//   [ system ][ prefix ][ body (may be cut) ][ suffix ]
//   └──────── fixed ───┘                     └─ fixed ┘
//
// Budget rules:
//   available = max_input_tokens - (system + prefix + suffix)
//   available <= 0             → configuration error, fatal
//   body longer than available → keep the first `available`
//                                tokens, drop the tail
//
// A second, hard ceiling protects the model's context window:
//   prompt_len + max_new_tokens <= context_window
// If it would be exceeded the assembled sequence is cut from
// the end. After that the invariant must hold; a violation is
// a bug in this file, so it is an assert, not an Err.
//
// Reference: Rust Book §8 (Vectors), §9 (Error Handling)

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::error::PromptError;
use crate::domain::traits::TokenCodec;

const SYSTEM_INSTRUCTIONS: &str = "你是一名经验丰富的医疗文档整理专家。\n\
针对多次出现的数值信息（如血糖、血压），请提取以下内容：\n\
- 常见值或平均值\n\
- 波动范围（最低值 ~ 最高值）\n\
- 波动幅度（最高值 - 最低值）\n\
缺项填‘未提及’；描述性内容以“是否提及”或“整体情况”总结；严禁重复段落、逐条罗列。\n\
任务是参考输出样例，严格按结构模板完成信息提取。\n";

const BODY_PREFIX: &str = "请根据以下病情描述内容整理出结构化结果：\n\n";

const STRUCTURE_SUFFIX: &str = "\n请将提取结果**直接填入以下结构模板中**。\n\
禁止解释、分析、推理、中间过程或编造信息。\n\
不得添加说明文字、注释、图表或非模板内容。\n\n\
结构模版如下：\n\
1. **血糖控制**\n\
- 空腹血糖波动情况：\n\
- 餐后血糖波动情况：\n\
- 症状：\n\
2. **血压管理**\n\
3. **依从性与监测问题**\n\
- 依从性：\n\
- 用药情况：\n\
4. **生活方式**\n\
- 饮食：\n\
- 运动：\n\
- 体重变化：\n\n";

/// The three fixed text segments wrapped around every note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub prefix: String,
    pub suffix: String,
}

impl PromptTemplate {
    pub fn new(
        system: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Load a template from a JSON file with `system`, `prefix`
    /// and `suffix` string fields.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read prompt template '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid prompt template '{}'", path.display()))
    }
}

/// The clinical four-section extraction template
impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(SYSTEM_INSTRUCTIONS, BODY_PREFIX, STRUCTURE_SUFFIX)
    }
}

/// Token limits a prompt has to respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    /// Budget for the whole prompt (template + body)
    pub max_input_tokens: usize,
    /// Absolute context window of the model
    pub context_window:   usize,
    /// Tokens reserved for generation
    pub max_new_tokens:   usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_input_tokens: 8000,
            context_window:   16384,
            max_new_tokens:   2048,
        }
    }
}

/// An assembled prompt plus what had to be cut to build it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub input_ids: Vec<u32>,
    /// Body tokens dropped to fit `max_input_tokens`
    pub body_truncated: usize,
    /// Tokens dropped from the assembled sequence to fit the context window
    pub hard_truncated: usize,
}

impl Prompt {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    /// Whether anything was cut to make the prompt fit
    pub fn was_truncated(&self) -> bool {
        self.body_truncated > 0 || self.hard_truncated > 0
    }
}

/// Builds prompts against a pre-tokenised template.
///
/// The fixed segments are encoded once in [`PromptBuilder::new`];
/// that is also where an oversized template is rejected.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_ids: Vec<u32>,
    prefix_ids: Vec<u32>,
    suffix_ids: Vec<u32>,
    available_budget: usize,
    limits: PromptLimits,
}

impl PromptBuilder {
    pub fn new(
        template: &PromptTemplate,
        codec:    &dyn TokenCodec,
        limits:   PromptLimits,
    ) -> Result<Self, PromptError> {
        let encode = |text: &str| {
            codec.encode(text).map_err(|e| PromptError::Tokenize(e.to_string()))
        };
        let system_ids = encode(&template.system)?;
        let prefix_ids = encode(&template.prefix)?;
        let suffix_ids = encode(&template.suffix)?;

        let reserved = system_ids.len() + prefix_ids.len() + suffix_ids.len();
        if reserved >= limits.max_input_tokens {
            return Err(PromptError::Configuration(format!(
                "max_input_tokens={} is too small for the fixed template ({} tokens)",
                limits.max_input_tokens, reserved
            )));
        }
        if limits.max_new_tokens >= limits.context_window {
            return Err(PromptError::Configuration(format!(
                "max_new_tokens={} leaves no room for input in a {}-token context window",
                limits.max_new_tokens, limits.context_window
            )));
        }

        tracing::debug!(
            "Prompt template uses {} tokens, {} left for the note body",
            reserved,
            limits.max_input_tokens - reserved
        );

        Ok(Self {
            system_ids,
            prefix_ids,
            suffix_ids,
            available_budget: limits.max_input_tokens - reserved,
            limits,
        })
    }

    /// How many body tokens fit next to the template
    pub fn available_budget(&self) -> usize {
        self.available_budget
    }

    /// Tokenise `body` and assemble the full prompt.
    pub fn build(&self, codec: &dyn TokenCodec, body: &str) -> Result<Prompt, PromptError> {
        let mut body_ids = codec
            .encode(body)
            .map_err(|e| PromptError::Tokenize(e.to_string()))?;

        let body_truncated = body_ids.len().saturating_sub(self.available_budget);
        if body_truncated > 0 {
            tracing::warn!(
                "Note body has {} tokens, truncated to {} to fit the input budget",
                body_ids.len(),
                self.available_budget
            );
            body_ids.truncate(self.available_budget);
        }

        let mut input_ids = Vec::with_capacity(
            self.system_ids.len() + self.prefix_ids.len() + body_ids.len() + self.suffix_ids.len(),
        );
        input_ids.extend_from_slice(&self.system_ids);
        input_ids.extend_from_slice(&self.prefix_ids);
        input_ids.extend_from_slice(&body_ids);
        input_ids.extend_from_slice(&self.suffix_ids);

        // Hard ceiling: prompt + generation must fit the context window
        let allowed = self.limits.context_window - self.limits.max_new_tokens;
        let hard_truncated = input_ids.len().saturating_sub(allowed);
        if hard_truncated > 0 {
            tracing::warn!(
                "Prompt has {} tokens, over the {} allowed by the context window; cut to {}",
                input_ids.len(),
                allowed,
                allowed
            );
            input_ids.truncate(allowed);
        }

        assert!(
            input_ids.len() + self.limits.max_new_tokens <= self.limits.context_window,
            "prompt of {} tokens + {} new tokens exceeds context window {}",
            input_ids.len(),
            self.limits.max_new_tokens,
            self.limits.context_window
        );

        Ok(Prompt { input_ids, body_truncated, hard_truncated })
    }
}
