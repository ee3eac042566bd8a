// ============================================================
// Layer 4 — Response Post-processing
// ============================================================
// Two small steps applied to every decoded generation:
//
//   1. process_response  — drop the reasoning trace that
//                          reasoning-distilled models emit before
//                          a closing `</think>` marker
//   2. OutputValidator   — count how many of the four template
//                          section headers made it into the text
//
// Reference: Rust Book §8 (Strings in Rust)

use crate::domain::record::MIN_PARTIAL_SECTIONS;

/// Closing marker of a model's reasoning trace
pub const THINK_END_MARKER: &str = "</think>";

/// Section headers every complete summary must contain
pub const REQUIRED_SECTIONS: [&str; 4] = [
    "**血糖控制**",
    "**血压管理**",
    "**依从性与监测问题**",
    "**生活方式**",
];

/// Strip everything up to and including the first `</think>`,
/// plus any newlines right after it. Text without the marker is
/// returned unchanged.
pub fn process_response(text: &str) -> String {
    match text.find(THINK_END_MARKER) {
        None => text.to_string(),
        Some(pos) => text[pos + THINK_END_MARKER.len()..]
            .trim_start_matches('\n')
            .to_string(),
    }
}

/// Scores output completeness against the required headers.
#[derive(Debug, Clone)]
pub struct OutputValidator {
    sections:     Vec<String>,
    min_sections: usize,
}

impl OutputValidator {
    /// `min_sections` is clamped to `MIN_PARTIAL_SECTIONS..=REQUIRED_SECTIONS.len()`
    /// so that FULL is always reachable and never below the FAIL line.
    pub fn new(min_sections: usize) -> Self {
        let clamped = min_sections.clamp(MIN_PARTIAL_SECTIONS, REQUIRED_SECTIONS.len());
        if clamped != min_sections {
            tracing::warn!(
                "min_sections={} is outside {}..={}, using {}",
                min_sections,
                MIN_PARTIAL_SECTIONS,
                REQUIRED_SECTIONS.len(),
                clamped
            );
        }
        Self {
            sections: REQUIRED_SECTIONS.iter().map(|s| s.to_string()).collect(),
            min_sections: clamped,
        }
    }

    /// Returns (matched_count, matched_count >= min_sections)
    pub fn score(&self, output: &str) -> (usize, bool) {
        let matched = self
            .sections
            .iter()
            .filter(|s| output.contains(s.as_str()))
            .count();
        (matched, matched >= self.min_sections)
    }
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self::new(REQUIRED_SECTIONS.len())
    }
}
