//! Route-table behavior that does not need a live backend.

use chorus::cli::{exit_code, Commands, GenerateArgs, RunContext};
use chorus::config::{BackendConfig, ChorusConfig};
use chorus::error::ApiError;
use chorus::provider::ProviderType;
use tempfile::TempDir;

fn context_with(backends: Vec<BackendConfig>, workspace: &TempDir) -> RunContext {
    let config = ChorusConfig {
        backends,
        ..ChorusConfig::default()
    };
    RunContext::from_config(config, workspace.path().to_path_buf())
}

#[test]
fn test_backends_json_lists_configured_backends() {
    let temp = TempDir::new().unwrap();
    let ctx = context_with(
        vec![BackendConfig::new("llama", ProviderType::Ollama, "llama3")],
        &temp,
    );
    let output = ctx
        .execute(&Commands::Backends {
            format: "json".to_string(),
        })
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["total"], 1);
    assert_eq!(value["backends"][0]["name"], "llama");
    assert_eq!(value["backends"][0]["api_key"], "not needed");
}

#[test]
fn test_backends_rejects_unknown_format() {
    let temp = TempDir::new().unwrap();
    let ctx = context_with(Vec::new(), &temp);
    let err = ctx
        .execute(&Commands::Backends {
            format: "yaml".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
}

#[test]
fn test_commit_without_backends_fails_before_touching_git() {
    let temp = TempDir::new().unwrap();
    let ctx = context_with(Vec::new(), &temp);
    let err = ctx
        .execute(&Commands::Commit(GenerateArgs::default()))
        .unwrap_err();
    assert!(matches!(err, ApiError::NoBackends));
    assert_eq!(exit_code(&err), 1);
}

#[test]
fn test_review_with_unknown_backend_is_rejected() {
    let temp = TempDir::new().unwrap();
    let ctx = context_with(
        vec![BackendConfig::new("llama", ProviderType::Ollama, "llama3")],
        &temp,
    );
    let args = GenerateArgs {
        backends: vec!["nope".to_string()],
        ..GenerateArgs::default()
    };
    let err = ctx.execute(&Commands::Review(args)).unwrap_err();
    assert!(matches!(err, ApiError::UnknownBackend(name) if name == "nope"));
}

#[test]
fn test_malformed_backend_fails_validation() {
    let temp = TempDir::new().unwrap();
    let mut backend = BackendConfig::new("claude", ProviderType::Anthropic, "claude-x");
    backend.api_key = Some("sk-test".to_string());
    backend.endpoint = Some("not a url".to_string());
    let ctx = context_with(vec![backend], &temp);
    let err = ctx
        .execute(&Commands::Commit(GenerateArgs::default()))
        .unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));
}
