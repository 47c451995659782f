//! Configuration loading feeding backend selection and transport setup.

use chorus::config::{ChorusConfig, ConfigLoader, WORKSPACE_CONFIG_FILE};
use chorus::error::ApiError;
use chorus::extract::ResponseMode;
use chorus::transport::TransportRegistry;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const WORKSPACE_TOML: &str = r#"
[generation]
message_style = "gitmoji"
candidate_count = 2

[[backends]]
name = "llama"
provider_type = "ollama"
model = "llama3"
timeout_secs = 5
response_mode = "prose"

[[backends]]
name = "lab"
provider_type = "local"
model = "qwen"
endpoint = "http://lab.internal:8080/v1"

[[backends]]
name = "spare"
provider_type = "ollama"
model = "mistral"
enabled = false
"#;

fn load_workspace(dir: &Path) -> ChorusConfig {
    fs::write(dir.join(WORKSPACE_CONFIG_FILE), WORKSPACE_TOML).unwrap();
    ConfigLoader::new(dir)
        .with_global_path(None)
        .with_env(false)
        .load()
        .unwrap()
}

#[test]
fn test_workspace_backends_become_transports_in_order() {
    let temp = TempDir::new().unwrap();
    let config = load_workspace(temp.path());
    assert!(config.validate().is_ok());

    let identities = config.enabled_backends(&[]).unwrap();
    let names: Vec<&str> = identities.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["llama", "lab"]);
    assert_eq!(identities[0].timeout, Duration::from_secs(5));
    assert_eq!(identities[0].response_mode, ResponseMode::Prose);

    let registry = TransportRegistry::from_backends(&identities).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.get("lab").is_some());
    assert!(registry.get("spare").is_none());
}

#[test]
fn test_explicit_selection_reaches_disabled_backend() {
    let temp = TempDir::new().unwrap();
    let config = load_workspace(temp.path());
    let identities = config.enabled_backends(&["spare".to_string()]).unwrap();
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].model, "mistral");
}

#[test]
fn test_unknown_selection_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = load_workspace(temp.path());
    let err = config.enabled_backends(&["gpt".to_string()]).unwrap_err();
    assert!(matches!(err, ApiError::UnknownBackend(name) if name == "gpt"));
}

#[test]
fn test_explicit_file_layers_over_workspace_file() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(WORKSPACE_CONFIG_FILE), WORKSPACE_TOML).unwrap();
    let explicit = temp.path().join("override.toml");
    fs::write(
        &explicit,
        r#"
[generation]
candidate_count = 4

[attempt_log]
sink = "none"
"#,
    )
    .unwrap();

    let config = ConfigLoader::new(temp.path())
        .with_global_path(None)
        .with_explicit_path(Some(explicit))
        .with_env(false)
        .load()
        .unwrap();
    assert_eq!(config.generation.candidate_count, 4);
    assert_eq!(config.backends.len(), 3);
    assert_eq!(config.generation.message_style.as_str(), "gitmoji");
}

#[test]
fn test_missing_explicit_file_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let err = ConfigLoader::new(temp.path())
        .with_global_path(None)
        .with_explicit_path(Some(temp.path().join("absent.toml")))
        .with_env(false)
        .load()
        .unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));
}

#[test]
fn test_duplicate_backend_names_fail_validation() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join(WORKSPACE_CONFIG_FILE),
        r#"
[[backends]]
name = "twin"
provider_type = "ollama"
model = "a"

[[backends]]
name = "twin"
provider_type = "ollama"
model = "b"
"#,
    )
    .unwrap();
    let config = ConfigLoader::new(temp.path())
        .with_global_path(None)
        .with_env(false)
        .load()
        .unwrap();
    assert!(config.validate_or_error().is_err());
}
