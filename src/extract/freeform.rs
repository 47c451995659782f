//! Freeform extraction for backends that answer in prose.

use crate::error::ExtractionError;
use crate::extract::style::{conforms, normalize_subject};
use crate::types::{Candidate, MessageStyle, RequestKind};
use regex::Regex;
use std::sync::OnceLock;

fn list_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*+•])\s+").expect("list marker pattern is valid")
    })
}

/// Paired `**bold**` and `` `code` `` spans; the inner text is kept.
fn inline_markup() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\*\*([^*\s](?:[^*]*[^*\s])?)\*\*|`([^`\s](?:[^`]*[^`\s])?)`")
            .expect("inline markup pattern is valid")
    })
}

/// Remove list numbering, markdown emphasis and wrapping quotes from one line.
///
/// `__` only counts as emphasis when it wraps the whole line, so identifiers such as
/// `__init__` survive.
pub fn clean_line(line: &str) -> String {
    let line = list_marker().replace(line, "");
    let line = inline_markup().replace_all(&line, "$1$2");
    let line = line.trim();
    let line = line
        .strip_prefix("__")
        .and_then(|rest| rest.strip_suffix("__"))
        .unwrap_or(line)
        .trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            line.strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(line);
    unquoted.trim().to_string()
}

pub fn extract_freeform(
    raw: &str,
    kind: RequestKind,
    style: MessageStyle,
    max_candidates: usize,
) -> Result<Vec<Candidate>, ExtractionError> {
    if kind == RequestKind::Review {
        return review_candidate(raw).map(|c| vec![c]);
    }

    let candidates: Vec<Candidate> = raw
        .lines()
        .filter(|line| !is_fence_line(line))
        .map(clean_line)
        .filter(|line| conforms(style, line))
        .map(|line| Candidate::new(normalize_subject(style, &line), None))
        .take(max_candidates.max(1))
        .collect();

    if candidates.is_empty() {
        return Err(ExtractionError::no_structured_content());
    }
    Ok(candidates)
}

fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn review_candidate(raw: &str) -> Result<Candidate, ExtractionError> {
    let text = raw.trim();
    let mut lines = text.lines();
    let title = lines
        .next()
        .map(clean_line)
        .filter(|t| !t.is_empty())
        .ok_or_else(ExtractionError::no_structured_content)?;
    let rest = lines.collect::<Vec<_>>().join("\n");
    let rest = rest.trim();
    let body = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };
    Ok(Candidate::new(title, body))
}
