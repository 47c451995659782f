//! Commit style conformance and subject normalization.

use crate::types::MessageStyle;
use regex::Regex;
use std::sync::OnceLock;

fn conventional_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<kind>[A-Za-z]+)(?P<scope>\([^()\r\n]*\))?(?P<breaking>!)?(?P<sep>:\s+)(?P<desc>\S.*)$",
        )
        .expect("conventional subject pattern is valid")
    })
}

fn gitmoji_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^:[A-Za-z0-9_+\-]+:\s+\S.*$").expect("gitmoji subject pattern is valid")
    })
}

/// Whether a single line satisfies the style's subject shape.
pub fn conforms(style: MessageStyle, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match style {
        MessageStyle::Plain => true,
        MessageStyle::Conventional => conventional_pattern().is_match(line),
        MessageStyle::Gitmoji => gitmoji_pattern().is_match(line),
    }
}

/// Normalize a subject to the style's casing rules. Non-matching subjects pass through.
pub fn normalize_subject(style: MessageStyle, subject: &str) -> String {
    let subject = subject.trim();
    match style {
        MessageStyle::Plain => subject.to_string(),
        MessageStyle::Conventional => match conventional_pattern().captures(subject) {
            Some(caps) => {
                let kind = caps["kind"].to_lowercase();
                let scope = caps.name("scope").map(|m| m.as_str()).unwrap_or("");
                let breaking = caps.name("breaking").map(|m| m.as_str()).unwrap_or("");
                format!(
                    "{}{}{}{}{}",
                    kind,
                    scope,
                    breaking,
                    &caps["sep"],
                    lowercase_first(&caps["desc"])
                )
            }
            None => subject.to_string(),
        },
        MessageStyle::Gitmoji => {
            if gitmoji_pattern().is_match(subject) {
                subject.to_lowercase()
            } else {
                subject.to_string()
            }
        }
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
