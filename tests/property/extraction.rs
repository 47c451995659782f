//! Property-based tests for candidate extraction guarantees

use chorus::extract::freeform::clean_line;
use chorus::extract::style::{conforms, normalize_subject};
use chorus::extract::{CandidateExtractor, ResponseMode};
use chorus::types::{MessageStyle, RequestKind};
use proptest::prelude::*;

fn any_mode() -> impl Strategy<Value = ResponseMode> {
    prop_oneof![
        Just(ResponseMode::Json),
        Just(ResponseMode::Prose),
        Just(ResponseMode::Auto),
    ]
}

fn any_style() -> impl Strategy<Value = MessageStyle> {
    prop_oneof![
        Just(MessageStyle::Plain),
        Just(MessageStyle::Conventional),
        Just(MessageStyle::Gitmoji),
    ]
}

fn any_kind() -> impl Strategy<Value = RequestKind> {
    prop_oneof![Just(RequestKind::Commit), Just(RequestKind::Review)]
}

/// Extraction either fails or yields between one and `max(1, n)` non-empty candidates.
#[test]
fn test_extraction_never_returns_empty_success() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(any::<String>(), any_mode(), any_style(), any_kind(), 0usize..6),
            |(raw, mode, style, kind, max)| {
                let extractor = CandidateExtractor::new(mode);
                if let Ok(candidates) = extractor.extract(&raw, kind, style, max) {
                    prop_assert!(!candidates.is_empty());
                    prop_assert!(candidates.len() <= max.max(1));
                    prop_assert!(candidates.iter().all(|c| !c.title.trim().is_empty()));
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Same reply, same candidates: extraction holds no state between calls.
#[test]
fn test_extraction_is_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let reply = prop_oneof![
        any::<String>(),
        "\\{\"subject\":\"[a-zA-Z:() ]{0,30}\"\\}",
        "(- [a-z]{1,6}: [a-z ]{1,20}\n){1,4}",
    ];
    runner
        .run(&(reply, any_mode(), any_style()), |(raw, mode, style)| {
            let extractor = CandidateExtractor::new(mode);
            let first = extractor
                .extract(&raw, RequestKind::Commit, style, 3)
                .map_err(|e| e.kind);
            let second = extractor
                .extract(&raw, RequestKind::Commit, style, 3)
                .map_err(|e| e.kind);
            prop_assert_eq!(first, second);
            Ok(())
        })
        .unwrap();
}

/// Prose replies in gitmoji style keep only lines that carry a gitmoji code.
#[test]
fn test_gitmoji_prose_candidates_conform() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let line = prop_oneof![
        ":[a-z_]{1,8}: [A-Za-z][A-Za-z ]{0,20}",
        "[A-Za-z][A-Za-z ]{0,20}",
        "[0-9]\\. :[a-z]{1,6}: [a-z]{1,10}",
    ];
    runner
        .run(&prop::collection::vec(line, 1..8), |lines| {
            let raw = lines.join("\n");
            let extractor = CandidateExtractor::new(ResponseMode::Prose);
            match extractor.extract(&raw, RequestKind::Commit, MessageStyle::Gitmoji, 10) {
                Ok(candidates) => {
                    for candidate in &candidates {
                        prop_assert!(conforms(MessageStyle::Gitmoji, &candidate.title));
                        prop_assert_eq!(candidate.title.clone(), candidate.title.to_lowercase());
                    }
                }
                Err(_) => {
                    prop_assert!(!lines
                        .iter()
                        .any(|l| conforms(MessageStyle::Gitmoji, &clean_line(l))));
                }
            }
            Ok(())
        })
        .unwrap();
}

/// Normalizing an already normalized conventional subject changes nothing.
#[test]
fn test_conventional_normalization_is_idempotent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &"[A-Za-z]{1,8}(\\([a-z]{1,6}\\))?!?: [A-Za-z][a-z ]{0,24}",
            |subject| {
                let once = normalize_subject(MessageStyle::Conventional, &subject);
                let twice = normalize_subject(MessageStyle::Conventional, &once);
                prop_assert_eq!(&once, &twice);
                prop_assert!(conforms(MessageStyle::Conventional, &once));
                Ok(())
            },
        )
        .unwrap();
}
