use crate::core::FileDiff;
use crate::errors::{ReviewError, ReviewResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub path: String,
    pub line: usize,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryReview {
    pub body: String,
}

#[derive(Debug, Default)]
pub struct AnchoredSuggestions {
    pub inline: Vec<Suggestion>,
    pub unanchored: Vec<Suggestion>,
}

/// Parses a single-chunk reply of the form
/// `[{"lineNumber": 12, "reviewComment": "..."}]`.
///
/// Code fences are tolerated, an empty reply means no suggestions, and
/// entries without a usable line or comment are skipped. Anything that is
/// not a JSON array is a [`ReviewError::Parse`].
pub fn parse_suggestions(path: &str, response: &str) -> ReviewResult<Vec<Suggestion>> {
    let cleaned = strip_code_fence(response);
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    let not_array = || ReviewError::Parse(format!("expected a JSON array for {}", path));
    let entries = match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Array(entries)) => entries,
        Ok(Value::Object(mut object)) => {
            match object.remove("comments").or_else(|| object.remove("suggestions")) {
                Some(Value::Array(entries)) => entries,
                _ => return Err(not_array()),
            }
        }
        Ok(_) => return Err(not_array()),
        Err(_) => extract_embedded_array(cleaned).ok_or_else(|| {
            ReviewError::Parse(format!("reply for {} is not JSON: {}", path, preview(cleaned)))
        })?,
    };

    let mut suggestions = Vec::new();
    for entry in entries {
        match suggestion_from_entry(path, &entry) {
            Some(suggestion) => suggestions.push(suggestion),
            None => debug!("Skipping unusable suggestion for {}: {}", path, entry),
        }
    }

    Ok(suggestions)
}

/// Cleans a full-context reply. An empty reply means the model had nothing
/// to add, so no summary is produced.
pub fn parse_summary(response: &str) -> Option<SummaryReview> {
    let cleaned = strip_code_fence(response);
    if cleaned.is_empty() {
        None
    } else {
        Some(SummaryReview {
            body: cleaned.to_string(),
        })
    }
}

/// Splits suggestions into those whose line exists on the new side of the
/// file's diff and those that cannot be attached inline.
pub fn anchor_suggestions(file: &FileDiff, suggestions: Vec<Suggestion>) -> AnchoredSuggestions {
    let mut anchored = AnchoredSuggestions::default();
    for suggestion in suggestions {
        if suggestion.path == file.path && file.can_anchor(suggestion.line) {
            anchored.inline.push(suggestion);
        } else {
            anchored.unanchored.push(suggestion);
        }
    }
    anchored
}

pub fn deduplicate(suggestions: &mut Vec<Suggestion>) {
    suggestions.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then(a.line.cmp(&b.line))
            .then(a.body.cmp(&b.body))
    });
    suggestions.dedup();
}

/// Markdown section listing suggestions that could not be posted inline.
pub fn render_general_notes(suggestions: &[Suggestion]) -> String {
    let mut output = String::from("### General notes\n\n");
    for suggestion in suggestions {
        output.push_str(&format!(
            "- `{}:{}`: {}\n",
            suggestion.path,
            suggestion.line,
            suggestion.body.replace('\n', "\n  ")
        ));
    }
    output
}

fn suggestion_from_entry(path: &str, entry: &Value) -> Option<Suggestion> {
    let line = match entry.get("lineNumber")? {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => leading_number(s),
        _ => None,
    }?;
    let body = entry.get("reviewComment")?.as_str()?.trim();
    if line == 0 || body.is_empty() {
        return None;
    }

    Some(Suggestion {
        path: path.to_string(),
        line,
        body: body.to_string(),
    })
}

// Accepts "12", " 12 " and ranges such as "12-14", anchoring on the start.
fn leading_number(raw: &str) -> Option<usize> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `markdown`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

// Tries each `[` in turn until one opens an array of objects, so bracketed
// prose such as `[docs]` or `[1]` before the real array is skipped.
fn extract_embedded_array(text: &str) -> Option<Vec<Value>> {
    text.match_indices('[').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Array(entries))) if entries.iter().all(Value::is_object) => {
                Some(entries)
            }
            _ => None,
        }
    })
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        out.push_str("...");
    }
    out
}
