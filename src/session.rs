//! Backend Session
//!
//! Runs one generation request against one backend and reduces everything that can
//! happen (reply, timeout, transport error, unusable reply, cancellation) to exactly
//! one `Outcome`. Failures are classified into a fixed taxonomy here so nothing above
//! this boundary needs to know how a particular provider reports errors.

use crate::backend::BackendIdentity;
use crate::error::ApiError;
use crate::extract::CandidateExtractor;
use crate::prompt::PromptBuilder;
use crate::sink::{AttemptRecord, AttemptSink};
use crate::transport::BackendTransport;
use crate::types::{Candidate, GenerationRequest};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fixed failure taxonomy surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthError,
    RateLimited,
    ModelUnavailable,
    Timeout,
    Network,
    InvalidResponse,
    Unknown,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::AuthError => "auth_error",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ModelUnavailable => "model_unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::Unknown => "unknown",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            FailureKind::AuthError => "Authentication failed, check the API key",
            FailureKind::RateLimited => "Rate limited, try again later",
            FailureKind::ModelUnavailable => "Model unavailable",
            FailureKind::Timeout => "Timed out waiting for a reply",
            FailureKind::Network => "Network error",
            FailureKind::InvalidResponse => "Reply contained no usable message",
            FailureKind::Unknown => "Generation failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error by variant first, then by status codes and wording in its message.
pub fn classify(error: &ApiError) -> FailureKind {
    match error {
        ApiError::ProviderAuthFailed(_) => return FailureKind::AuthError,
        ApiError::ProviderRateLimit(_) => return FailureKind::RateLimited,
        ApiError::ProviderModelNotFound(_) => return FailureKind::ModelUnavailable,
        ApiError::ProviderTimeout(_) => return FailureKind::Timeout,
        ApiError::ProviderConnection(_) => return FailureKind::Network,
        ApiError::Extraction(_) => return FailureKind::InvalidResponse,
        ApiError::Cancelled => return FailureKind::Unknown,
        _ => {}
    }

    let message = error.to_string().to_lowercase();
    if let Some(kind) = status_token(&message).and_then(kind_for_status) {
        return kind;
    }
    message_rules()
        .iter()
        .find(|(_, pattern)| pattern.is_match(&message))
        .map(|(kind, _)| *kind)
        .unwrap_or(FailureKind::Unknown)
}

/// An explicit `status NNN` / `http NNN` token; bare numbers in bodies do not count.
fn status_token(message: &str) -> Option<u16> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:status|http)(?:\s+code)?[\s:=]+(\d{3})\b")
            .expect("status token pattern is valid")
    });
    pattern.captures(message)?.get(1)?.as_str().parse().ok()
}

fn kind_for_status(status: u16) -> Option<FailureKind> {
    match status {
        401 | 403 => Some(FailureKind::AuthError),
        429 => Some(FailureKind::RateLimited),
        404 | 503 | 529 => Some(FailureKind::ModelUnavailable),
        408 | 504 => Some(FailureKind::Timeout),
        _ => None,
    }
}

/// Whole-word phrases checked in order once no status token decided the kind.
fn message_rules() -> &'static [(FailureKind, Regex)] {
    static RULES: OnceLock<Vec<(FailureKind, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (
                FailureKind::AuthError,
                r"\b(?:unauthorized|forbidden|invalid (?:x-)?api key|authentication)\b",
            ),
            (
                FailureKind::RateLimited,
                r"\b(?:rate[ _]limit(?:ed)?|too many requests|quota)\b",
            ),
            (
                FailureKind::ModelUnavailable,
                r"\b(?:model not found|does not exist|overloaded|unavailable)\b",
            ),
            (FailureKind::Timeout, r"\b(?:timeout|timed out|deadline)\b"),
            (
                FailureKind::Network,
                r"\b(?:connection|connect|dns|network|unreachable|reset by peer)\b",
            ),
            (
                FailureKind::InvalidResponse,
                r"\b(?:parse|invalid response|no choices|no text content)\b",
            ),
        ]
        .into_iter()
        .map(|(kind, pattern)| {
            (
                kind,
                Regex::new(pattern).expect("failure message pattern is valid"),
            )
        })
        .collect()
    })
}

/// Short human-readable text for an error Choice.
pub fn display_message(kind: FailureKind, error: &ApiError) -> String {
    let detail = error.to_string();
    let detail = detail.lines().next().unwrap_or("").trim();
    const MAX_DETAIL: usize = 120;
    let detail: String = if detail.chars().count() > MAX_DETAIL {
        let cut: String = detail.chars().take(MAX_DETAIL).collect();
        format!("{}...", cut)
    } else {
        detail.to_string()
    };
    if detail.is_empty() {
        kind.summary().to_string()
    } else {
        format!("{} ({})", kind.summary(), detail)
    }
}

/// Result of one session run: all candidates, or one classified failure.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success {
        candidates: Vec<Candidate>,
    },
    Failure {
        kind: FailureKind,
        display_message: String,
        raw: Arc<ApiError>,
    },
}

impl Outcome {
    pub fn failure(error: ApiError) -> Self {
        let kind = classify(&error);
        Outcome::Failure {
            kind,
            display_message: display_message(kind, &error),
            raw: Arc::new(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}

/// One backend invocation for one request.
pub struct BackendSession {
    identity: BackendIdentity,
    transport: Arc<dyn BackendTransport>,
    prompts: Arc<PromptBuilder>,
    sink: Option<Arc<dyn AttemptSink>>,
    state: SessionState,
}

impl BackendSession {
    pub fn new(
        identity: BackendIdentity,
        transport: Arc<dyn BackendTransport>,
        prompts: Arc<PromptBuilder>,
        sink: Option<Arc<dyn AttemptSink>>,
    ) -> Self {
        Self {
            identity,
            transport,
            prompts,
            sink,
            state: SessionState::Idle,
        }
    }

    pub fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the request once. Never fails: every problem becomes `Outcome::Failure`.
    pub async fn run(&mut self, request: &GenerationRequest, cancel: &CancellationToken) -> Outcome {
        if self.state != SessionState::Idle {
            return Outcome::failure(ApiError::ProviderError(format!(
                "Session for backend '{}' already ran",
                self.identity.name
            )));
        }
        self.state = SessionState::Running;

        let started = Instant::now();
        let extractor = CandidateExtractor::new(self.identity.response_mode);
        let system_prompt = self.prompts.system_prompt(request, extractor.mode());

        debug!(
            backend = %self.identity.name,
            model = %self.identity.model,
            request_id = %request.request_id,
            timeout_ms = self.identity.timeout.as_millis() as u64,
            "Backend session started"
        );

        let reply = if cancel.is_cancelled() {
            Err(ApiError::Cancelled)
        } else {
            self.invoke(request, &system_prompt, cancel).await
        };

        let (outcome, reply_text) = match reply {
            Ok(text) => {
                let outcome = match extractor.extract_for(&text, request) {
                    Ok(candidates) => Outcome::Success { candidates },
                    Err(e) => Outcome::failure(ApiError::Extraction(e)),
                };
                (outcome, Some(text))
            }
            Err(e) => (Outcome::failure(e), None),
        };

        self.record_attempt(request, &system_prompt, started, &outcome, reply_text);
        self.finish(outcome, started)
    }

    async fn invoke(
        &self,
        request: &GenerationRequest,
        system_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let call = self
            .transport
            .invoke(&request.source_text, system_prompt, &self.identity);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = tokio::time::timeout(self.identity.timeout, call) => match result {
                Ok(reply) => reply,
                Err(_) => Err(ApiError::ProviderTimeout(self.identity.timeout.as_millis() as u64)),
            },
        }
    }

    fn finish(&mut self, outcome: Outcome, started: Instant) -> Outcome {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Outcome::Success { candidates } => {
                self.state = SessionState::Succeeded;
                debug!(
                    backend = %self.identity.name,
                    candidates = candidates.len(),
                    elapsed_ms,
                    "Backend session succeeded"
                );
            }
            Outcome::Failure { kind, raw, .. } => {
                self.state = SessionState::Failed;
                warn!(
                    backend = %self.identity.name,
                    failure_kind = %kind,
                    error = %raw,
                    elapsed_ms,
                    "Backend session failed"
                );
            }
        }
        outcome
    }

    fn record_attempt(
        &self,
        request: &GenerationRequest,
        system_prompt: &str,
        started: Instant,
        outcome: &Outcome,
        reply: Option<String>,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };
        let (ok, candidate_count, failure_kind, error) = match outcome {
            Outcome::Success { candidates } => (true, candidates.len(), None, None),
            Outcome::Failure { kind, raw, .. } => {
                (false, 0, Some(kind.as_str().to_string()), Some(raw.to_string()))
            }
        };
        sink.record(AttemptRecord {
            ts: AttemptRecord::now_ts(),
            request_id: request.request_id.clone(),
            request_kind: request.request_kind.as_str().to_string(),
            backend: self.identity.name.clone(),
            model: self.identity.model.clone(),
            duration_ms: started.elapsed().as_millis(),
            ok,
            candidate_count,
            failure_kind,
            prompt: system_prompt.to_string(),
            reply,
            error,
        });
    }
}
