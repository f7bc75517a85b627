//! Structured-reply extraction from free-form model output.
//!
//! Models wrap JSON in markdown fences, prefix it with chatter, or return
//! something else entirely. [`parse_structured_reply`] strips fences, finds
//! the first balanced `{...}` object and reads a [`ProposedAction`] out of
//! it, defaulting the fields it can.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use taskchat_core::types::{ActionKind, ProposedAction, TaskData};

/// Reply used when the model omits one.
pub const DEFAULT_REPLY: &str = "I processed your request.";

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:json)?\n?").unwrap());

/// Why a model reply could not be read as a structured action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    #[error("no JSON object found in response")]
    NoObject,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// Remove markdown code-fence markers and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Find the first substring forming a balanced `{...}` object.
///
/// Braces inside JSON string literals are ignored. If the object opened at
/// the first `{` never closes, later `{` positions are tried.
pub fn find_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            return Some(&text[start..=end]);
        }
        search_from = start + 1;
    }
    None
}

/// Index of the `}` closing the object opened at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Read a [`ProposedAction`] out of raw model output.
///
/// Missing or blank `reply` becomes [`DEFAULT_REPLY`]; missing or
/// unrecognized `action` becomes `none`.
pub fn parse_structured_reply(raw: &str) -> Result<ProposedAction, ParseFailure> {
    let cleaned = strip_code_fences(raw);
    let candidate = find_json_object(&cleaned).ok_or(ParseFailure::NoObject)?;

    let value: Value =
        serde_json::from_str(candidate).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;
    let obj = value.as_object().ok_or(ParseFailure::NoObject)?;

    let reply = obj
        .get("reply")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REPLY)
        .to_string();

    let action = match obj.get("action").and_then(Value::as_str) {
        Some(name) => ActionKind::from_name(name).unwrap_or_else(|| {
            debug!(action = name, "Unrecognized action from model, treating as none");
            ActionKind::None
        }),
        None => ActionKind::None,
    };

    let task_data = obj
        .get("taskData")
        .or_else(|| obj.get("task_data"))
        .and_then(TaskData::from_value);

    Ok(ProposedAction {
        action,
        task_data,
        reply,
    })
}
