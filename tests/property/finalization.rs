//! Property-based tests for choice list aggregation

use chorus::choice::{finalize, Choice, ChoiceListModel, FinalState};
use chorus::error::ApiError;
use chorus::session::Outcome;
use chorus::types::Candidate;
use proptest::prelude::*;

/// Per backend: `Some(n)` is a success with `n` candidates, `None` a failure.
fn backend_results() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec(prop::option::of(1usize..4), 0..8)
}

fn outcome_for(result: Option<usize>) -> Outcome {
    match result {
        Some(n) => Outcome::Success {
            candidates: (0..n)
                .map(|i| Candidate::new(format!("feat: candidate {}", i), None))
                .collect(),
        },
        None => Outcome::failure(ApiError::ProviderConnection("refused".to_string())),
    }
}

/// The terminal state depends only on whether any backend succeeded.
#[test]
fn test_final_state_matches_backend_results() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&backend_results(), |results| {
            let mut model = ChoiceListModel::new();
            for (index, result) in results.iter().enumerate() {
                let backend = format!("backend-{}", index);
                for choice in Choice::from_outcome(&backend, &outcome_for(*result)) {
                    model.append(choice);
                }
            }

            let snapshot = model.snapshot();
            let expected_len: usize = results.iter().map(|r| r.unwrap_or(1)).sum();
            prop_assert_eq!(snapshot.len(), expected_len);

            let expected = if results.iter().any(Option::is_some) {
                FinalState::PartialOrFullSuccess
            } else {
                FinalState::AllFailed
            };
            prop_assert_eq!(finalize(&snapshot), expected);
            prop_assert_eq!(finalize(&snapshot), finalize(&model.snapshot()));
            Ok(())
        })
        .unwrap();
}

/// Error entries are never selectable and never carry a message value.
#[test]
fn test_error_entries_are_inert() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&backend_results(), |results| {
            for (index, result) in results.iter().enumerate() {
                let backend = format!("backend-{}", index);
                for choice in Choice::from_outcome(&backend, &outcome_for(*result)) {
                    prop_assert_eq!(choice.is_error, !choice.is_selectable());
                    if choice.is_error {
                        prop_assert!(choice.value.is_empty());
                        prop_assert!(choice.label.starts_with(&backend));
                    }
                }
            }
            Ok(())
        })
        .unwrap();
}
