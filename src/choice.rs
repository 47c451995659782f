//! Choice list: the append-only, presentation-ready projection of a run's results.

use crate::session::Outcome;
use crate::types::Candidate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// One selectable candidate, or one disabled error entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
    pub is_error: bool,
    pub disabled: bool,
    pub backend: String,
}

impl Choice {
    pub fn from_candidate(backend: &str, candidate: &Candidate) -> Self {
        Self {
            label: candidate.title.clone(),
            value: candidate.message(),
            is_error: false,
            disabled: false,
            backend: backend.to_string(),
        }
    }

    pub fn from_failure(backend: &str, display_message: &str) -> Self {
        Self {
            label: format!("{}: {}", backend, display_message),
            value: String::new(),
            is_error: true,
            disabled: true,
            backend: backend.to_string(),
        }
    }

    /// Choices for one outcome, in extractor order.
    pub fn from_outcome(backend: &str, outcome: &Outcome) -> Vec<Self> {
        match outcome {
            Outcome::Success { candidates } => candidates
                .iter()
                .map(|candidate| Self::from_candidate(backend, candidate))
                .collect(),
            Outcome::Failure {
                display_message, ..
            } => vec![Self::from_failure(backend, display_message)],
        }
    }

    pub fn is_selectable(&self) -> bool {
        !self.is_error && !self.disabled
    }
}

/// Aggregate terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    AllFailed,
    PartialOrFullSuccess,
}

/// Pure scan over the final list: empty or all-error means nothing usable.
pub fn finalize(choices: &[Choice]) -> FinalState {
    if choices.iter().all(|choice| choice.is_error || choice.disabled) {
        FinalState::AllFailed
    } else {
        FinalState::PartialOrFullSuccess
    }
}

/// Append-only choice sequence with live observers.
///
/// Not internally synchronized; the orchestrator's aggregator is its only writer.
#[derive(Debug, Default)]
pub struct ChoiceListModel {
    entries: Vec<Choice>,
    observers: Vec<UnboundedSender<Choice>>,
}

impl ChoiceListModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every choice appended from now on.
    pub fn subscribe(&mut self) -> UnboundedReceiver<Choice> {
        let (tx, rx) = unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn append(&mut self, choice: Choice) {
        self.observers
            .retain(|observer| observer.send(choice.clone()).is_ok());
        self.entries.push(choice);
    }

    pub fn snapshot(&self) -> Vec<Choice> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_errors(&self) -> bool {
        finalize(&self.entries) == FinalState::AllFailed
    }

    pub fn selectable(&self) -> impl Iterator<Item = &Choice> {
        self.entries.iter().filter(|choice| choice.is_selectable())
    }

    /// Drop all observers so their streams end.
    pub fn close_observers(&mut self) {
        self.observers.clear();
    }
}
