//! Error types for the chorus generation pipeline.

use thiserror::Error;

/// Why a backend reply could not be turned into candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// No bracketed JSON span (or, in prose mode, no conforming line) was found.
    NoStructuredContent,
    /// A bracketed span was found but did not parse as JSON.
    MalformedJson,
    /// The JSON parsed but an element lacks a string `subject`.
    MalformedCandidate,
}

impl ExtractionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionErrorKind::NoStructuredContent => "no_structured_content",
            ExtractionErrorKind::MalformedJson => "malformed_json",
            ExtractionErrorKind::MalformedCandidate => "malformed_candidate",
        }
    }
}

/// Extraction failure with the offending span kept for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub message: String,
    pub span: Option<String>,
}

impl ExtractionError {
    pub fn no_structured_content() -> Self {
        Self {
            kind: ExtractionErrorKind::NoStructuredContent,
            message: "Response contained no usable content".to_string(),
            span: None,
        }
    }

    pub fn malformed_json(span: &str, cause: &serde_json::Error) -> Self {
        Self {
            kind: ExtractionErrorKind::MalformedJson,
            message: format!("Response JSON could not be parsed: {}", cause),
            span: Some(span.to_string()),
        }
    }

    pub fn malformed_candidate(index: usize, span: &str) -> Self {
        Self {
            kind: ExtractionErrorKind::MalformedCandidate,
            message: format!("Candidate {} has no string `subject` field", index),
            span: Some(span.to_string()),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Provider request timed out after {0} ms")]
    ProviderTimeout(u64),

    #[error("Provider connection failed: {0}")]
    ProviderConnection(String),

    #[error("Invalid response: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("No backends selected for generation")]
    NoBackends,

    #[error("No transport registered for backend: {0}")]
    UnknownBackend(String),

    #[error("Diff error: {0}")]
    Diff(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("no usable result was produced")]
    NoUsableResult,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
