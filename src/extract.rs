//! Candidate Extraction
//!
//! Turns one backend's raw text reply into validated, style-conformant candidates.
//! Pure functions only: no I/O and no shared state. The structured pass looks for a
//! JSON object or array of objects anywhere in the reply; the freeform pass reads
//! prose line by line and keeps lines that satisfy the requested commit style.

use crate::error::{ExtractionError, ExtractionErrorKind};
use crate::types::{Candidate, GenerationRequest, MessageStyle, RequestKind};
use serde::{Deserialize, Serialize};

pub mod freeform;
pub mod structured;
pub mod style;

pub use freeform::extract_freeform;
pub use structured::extract_structured;

/// How a backend is expected to format its reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// JSON only; prose replies are rejected.
    #[default]
    Json,
    /// Prose only; lines are filtered by style conformance.
    Prose,
    /// JSON first, prose when no JSON span exists at all.
    Auto,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Json => "json",
            ResponseMode::Prose => "prose",
            ResponseMode::Auto => "auto",
        }
    }
}

/// Structured extraction. Never returns an empty success.
pub fn extract(
    raw: &str,
    kind: RequestKind,
    style: MessageStyle,
    max_candidates: usize,
) -> Result<Vec<Candidate>, ExtractionError> {
    extract_structured(raw, kind, style, max_candidates)
}

/// Extractor bound to one backend's response mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateExtractor {
    mode: ResponseMode,
}

impl CandidateExtractor {
    pub fn new(mode: ResponseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn extract(
        &self,
        raw: &str,
        kind: RequestKind,
        style: MessageStyle,
        max_candidates: usize,
    ) -> Result<Vec<Candidate>, ExtractionError> {
        match self.mode {
            ResponseMode::Json => extract_structured(raw, kind, style, max_candidates),
            ResponseMode::Prose => extract_freeform(raw, kind, style, max_candidates),
            ResponseMode::Auto => match extract_structured(raw, kind, style, max_candidates) {
                Err(err) if err.kind == ExtractionErrorKind::NoStructuredContent => {
                    extract_freeform(raw, kind, style, max_candidates)
                }
                other => other,
            },
        }
    }

    pub fn extract_for(
        &self,
        raw: &str,
        request: &GenerationRequest,
    ) -> Result<Vec<Candidate>, ExtractionError> {
        self.extract(
            raw,
            request.request_kind,
            request.message_style,
            request.candidate_count,
        )
    }
}
