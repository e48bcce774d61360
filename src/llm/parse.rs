//! Reading structured replies out of free-form model output.
//!
//! Models asked for "ONLY JSON" still wrap it in code fences or a sentence
//! of prose.  The parsers here find the first balanced JSON value in the
//! reply and accept the shapes models commonly produce.  Anything else is an
//! [`LlmError::Parse`], never a panic.

use serde_json::Value;

use super::interviewer::{Evaluation, LlmError};

/// Extract the question list, keeping at most `count` entries.
///
/// Accepted shapes: `["q", ...]`, `{"questions": [...]}` and lists whose
/// items are objects with a `question` (or `text`) field.  An empty list is
/// an error; a longer list is truncated.
pub fn parse_questions(reply: &str, count: usize) -> Result<Vec<String>, LlmError> {
    let value = extract_json(reply)?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("questions")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Parse("no \"questions\" array in reply".into()))?,
        _ => return Err(LlmError::Parse("reply is not a list of questions".into())),
    };

    let mut questions: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj
                .get("question")
                .or_else(|| obj.get("text"))
                .and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if questions.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    if questions.len() > count {
        log::debug!(
            "llm: truncating {} questions to {}",
            questions.len(),
            count
        );
        questions.truncate(count);
    } else if questions.len() < count {
        log::warn!(
            "llm: asked for {} questions, got {}",
            count,
            questions.len()
        );
    }
    Ok(questions)
}

/// Extract an evaluation verdict.
///
/// `spoken_response` may also arrive as `response`, `feedback` or `reply`;
/// `advance` as `move_on` / `next`, and as a boolean or a `"true"`/`"yes"`
/// string.
pub fn parse_evaluation(reply: &str) -> Result<Evaluation, LlmError> {
    let value = extract_json(reply)?;
    let obj = value
        .as_object()
        .ok_or_else(|| LlmError::Parse("evaluation is not a JSON object".into()))?;

    let spoken_response = ["spoken_response", "response", "feedback", "reply"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(LlmError::EmptyResponse)?
        .to_string();

    let advance = ["advance", "move_on", "next"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(as_flag)
        .ok_or_else(|| LlmError::Parse("missing boolean \"advance\"".into()))?;

    Ok(Evaluation {
        spoken_response,
        advance,
    })
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Find and parse the first JSON object or array in `reply`.
fn extract_json(reply: &str) -> Result<Value, LlmError> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find(['{', '[']) {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&trimmed[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..start + end]) {
                return Ok(value);
            }
        }
        search_from = start + 1;
    }

    Err(LlmError::Parse(format!(
        "no JSON found in reply: {}",
        preview(trimmed)
    )))
}

/// Byte length of the balanced bracket group at the start of `s`.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(s: &str) -> String {
    const MAX: usize = 80;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
