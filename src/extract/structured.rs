//! Structured (JSON) extraction: fence stripping, bracket scan, candidate validation.

use crate::error::ExtractionError;
use crate::extract::style::normalize_subject;
use crate::types::{Candidate, MessageStyle, RequestKind};
use serde_json::{Map, Value};

const FENCE: &str = "```";

/// Return the inner text of the first fenced block, or the input when there is none.
pub fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let after_open = &text[open + FENCE.len()..];
    // Language tag runs up to the first newline, e.g. ```json
    let body_start = match after_open.find('\n') {
        Some(newline) if is_language_tag(&after_open[..newline]) => newline + 1,
        _ => 0,
    };
    let body = &after_open[body_start..];
    match body.find(FENCE) {
        Some(close) => &body[..close],
        None => body,
    }
}

fn is_language_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Find the first balanced JSON object, or array whose first element is an object.
///
/// One pass with a bracket stack: every balanced group that closes is a candidate,
/// and the leftmost acceptable one wins once its outermost group closes or breaks.
pub fn find_json_span(text: &str) -> Option<&str> {
    let mut open: Vec<(char, usize)> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' | '[' => open.push((ch, index)),
            '}' | ']' => {
                let Some((opener, start)) = open.pop() else {
                    continue;
                };
                if closer_for(opener) != ch {
                    // Unbalanced group: nothing opened so far can close any more.
                    open.clear();
                } else if is_acceptable(text, opener, start)
                    && best.map_or(true, |(best_start, _)| start < best_start)
                {
                    best = Some((start, index));
                }
                if open.is_empty() && best.is_some() {
                    break;
                }
            }
            _ => {}
        }
    }
    best.map(|(start, end)| &text[start..=end])
}

fn closer_for(opener: char) -> char {
    if opener == '{' {
        '}'
    } else {
        ']'
    }
}

fn is_acceptable(text: &str, opener: char, start: usize) -> bool {
    opener == '{' || text[start + 1..].trim_start().starts_with('{')
}

/// Run the structured pipeline over one raw reply.
pub fn extract_structured(
    raw: &str,
    kind: RequestKind,
    style: MessageStyle,
    max_candidates: usize,
) -> Result<Vec<Candidate>, ExtractionError> {
    let text = strip_code_fence(raw);
    let span = find_json_span(text).ok_or_else(ExtractionError::no_structured_content)?;
    let parsed: Value =
        serde_json::from_str(span).map_err(|e| ExtractionError::malformed_json(span, &e))?;

    let elements = match parsed {
        Value::Array(items) => items,
        other @ Value::Object(_) => vec![other],
        _ => return Err(ExtractionError::no_structured_content()),
    };

    let mut candidates = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let object = element
            .as_object()
            .ok_or_else(|| ExtractionError::malformed_candidate(index, span))?;
        let candidate = candidate_from_object(object, kind, style)
            .ok_or_else(|| ExtractionError::malformed_candidate(index, span))?;
        candidates.push(candidate);
    }

    candidates.truncate(max_candidates.max(1));
    Ok(candidates)
}

fn candidate_from_object(
    object: &Map<String, Value>,
    kind: RequestKind,
    style: MessageStyle,
) -> Option<Candidate> {
    let subject = object.get("subject")?.as_str()?.trim();
    let mut lines = subject.lines();
    let first = lines.next()?.trim();
    if first.is_empty() {
        return None;
    }

    let title = match kind {
        RequestKind::Commit => normalize_subject(style, first),
        RequestKind::Review => first.to_string(),
    };

    let overflow = lines.collect::<Vec<_>>().join("\n");
    let sections: Vec<String> = [
        Some(overflow.as_str()),
        string_field(object, "body"),
        string_field(object, "footer"),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|section| !section.is_empty())
    .map(str::to_string)
    .collect();

    let body = if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    };
    Some(Candidate::new(title, body))
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}
