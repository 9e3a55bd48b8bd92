//! Tolerant JSON extraction from LLM output
//!
//! Local models wrap structured decisions in prose or markdown fences more
//! often than not. This is a best-effort recovery layer used only at the
//! LLM-output to structured-decision boundary.

use serde_json::Value;

use crate::core::error::{MaestroError, Result};

/// Parse possibly-malformed LLM text into JSON.
///
/// Tries, in order: a direct parse, the body of a markdown code fence, and
/// the outermost `{..}` slice. Returns a [`MaestroError::DecisionParse`] if
/// nothing yields valid JSON.
pub fn parse_json_with_recovery(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MaestroError::decision_parse("empty response"));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(fenced.trim()) {
            return Ok(value);
        }
    }

    if let Some(slice) = outer_object_slice(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(slice) {
            return Ok(value);
        }
    }

    Err(MaestroError::decision_parse(format!(
        "could not recover JSON from response: {}",
        truncate(trimmed, 200)
    )))
}

/// Extract the body of the first markdown code fence, if present
fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n')?;
    let body = &after_fence[body_start + 1..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Slice from the first '{' to the last '}', if both exist
fn outer_object_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
