//! Core value types shared by the extractor, sessions and the orchestrator.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the generated text summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Commit,
    Review,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Commit => "commit",
            RequestKind::Review => "review",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit subject convention a candidate must follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStyle {
    #[default]
    Plain,
    Conventional,
    Gitmoji,
}

impl MessageStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStyle::Plain => "plain",
            MessageStyle::Conventional => "conventional",
            MessageStyle::Gitmoji => "gitmoji",
        }
    }
}

impl fmt::Display for MessageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStyle {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(MessageStyle::Plain),
            "conventional" => Ok(MessageStyle::Conventional),
            "gitmoji" => Ok(MessageStyle::Gitmoji),
            other => Err(ApiError::ConfigError(format!(
                "Invalid message style: {}. Must be plain, conventional, or gitmoji",
                other
            ))),
        }
    }
}

/// One generation request, shared read-only by every session of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub request_id: String,
    pub source_text: String,
    pub request_kind: RequestKind,
    pub locale: String,
    pub max_length: usize,
    pub candidate_count: usize,
    pub message_style: MessageStyle,
    pub include_body: bool,
}

impl GenerationRequest {
    /// Build a request with a fresh request id, rejecting unusable parameters.
    pub fn new(
        source_text: impl Into<String>,
        request_kind: RequestKind,
        locale: impl Into<String>,
        max_length: usize,
        candidate_count: usize,
        message_style: MessageStyle,
        include_body: bool,
    ) -> Result<Self, ApiError> {
        let source_text = source_text.into();
        if source_text.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "source text is empty".to_string(),
            ));
        }
        if candidate_count == 0 {
            return Err(ApiError::InvalidRequest(
                "candidate count must be at least 1".to_string(),
            ));
        }
        if max_length == 0 {
            return Err(ApiError::InvalidRequest(
                "max length must be at least 1".to_string(),
            ));
        }
        let locale = locale.into();
        Ok(Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            source_text,
            request_kind,
            locale: if locale.trim().is_empty() {
                "en".to_string()
            } else {
                locale
            },
            max_length,
            candidate_count,
            message_style,
            include_body,
        })
    }
}

/// A validated, style-conformant summary extracted from one backend reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, body: Option<String>) -> Self {
        Self {
            title: title.into(),
            body,
        }
    }

    /// Full message text: title, then the body separated by a blank line.
    pub fn message(&self) -> String {
        match &self.body {
            Some(body) => format!("{}\n\n{}", self.title, body),
            None => self.title.clone(),
        }
    }
}
