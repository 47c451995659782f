//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain errors to the message printed on stderr, with a hint where one helps.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::NoBackends => format!(
            "{}\nhint: add a [[backends]] entry to .chorus.toml or the global config",
            e
        ),
        ApiError::UnknownBackend(name) => format!(
            "Unknown backend: {}\nhint: run 'chorus backends' to list configured names",
            name
        ),
        _ => e.to_string(),
    }
}

/// Process exit code for an error.
pub fn exit_code(e: &ApiError) -> i32 {
    match e {
        ApiError::Cancelled => 130,
        ApiError::NoUsableResult => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed_message_and_code() {
        assert_eq!(map_error(&ApiError::NoUsableResult), "no usable result was produced");
        assert_eq!(exit_code(&ApiError::NoUsableResult), 2);
        assert_eq!(exit_code(&ApiError::Cancelled), 130);
    }

    #[test]
    fn test_unknown_backend_has_hint() {
        let message = map_error(&ApiError::UnknownBackend("gpt".to_string()));
        assert!(message.contains("chorus backends"));
    }
}
