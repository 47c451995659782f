//! Configuration System
//!
//! Layered configuration for generation defaults, the backend list, the attempt log and
//! logging. Layers, lowest precedence first: built-in defaults, the global file, the
//! workspace `.chorus.toml`, an explicit `--config` file, then `CHORUS__*` variables.

use crate::backend::{BackendIdentity, DEFAULT_TIMEOUT};
use crate::error::ApiError;
use crate::extract::ResponseMode;
use crate::logging::LoggingConfig;
use crate::provider::ProviderType;
use crate::types::MessageStyle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChorusConfig {
    #[serde(default)]
    pub generation: GenerationDefaults,

    /// Backends in dispatch order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub attempt_log: AttemptLogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Request defaults; CLI flags override these per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    #[serde(default)]
    pub message_style: MessageStyle,

    #[serde(default)]
    pub include_body: bool,

    /// Extra pathspecs left out of the diff, on top of lock files
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Replaces the built-in commit prompt template
    #[serde(default)]
    pub commit_template: Option<String>,

    /// Replaces the built-in review prompt template
    #[serde(default)]
    pub review_template: Option<String>,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_max_length() -> usize {
    72
}

fn default_candidate_count() -> usize {
    3
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            max_length: default_max_length(),
            candidate_count: default_candidate_count(),
            message_style: MessageStyle::default(),
            include_body: false,
            exclude: Vec::new(),
            commit_template: None,
            review_template: None,
        }
    }
}

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub provider_type: ProviderType,
    pub model: String,

    /// Falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY when absent
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub response_mode: ResponseMode,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, provider_type: ProviderType, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type,
            model: model.into(),
            api_key: None,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_tokens: None,
            response_mode: ResponseMode::default(),
            enabled: true,
        }
    }

    /// Configured key, or the provider's conventional environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.provider_type
                    .api_key_env_var()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|key| !key.trim().is_empty())
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Backend name cannot be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be at least 1".to_string());
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "temperature {} is outside the range 0.0 to 2.0",
                    temperature
                ));
            }
        }
        match &self.endpoint {
            Some(endpoint) => {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(format!("Invalid endpoint URL: {}", endpoint));
                }
            }
            None if self.provider_type == ProviderType::LocalCustom => {
                return Err("Local backends require an endpoint".to_string());
            }
            None => {}
        }
        if let Some(var) = self.provider_type.api_key_env_var() {
            if self.resolved_api_key().is_none() {
                return Err(format!(
                    "No API key configured (set api_key or {})",
                    var
                ));
            }
        }
        Ok(())
    }

    pub fn to_identity(&self) -> BackendIdentity {
        BackendIdentity {
            name: self.name.clone(),
            provider_type: self.provider_type,
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.resolved_api_key(),
            timeout: Duration::from_secs(self.timeout_secs),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_mode: self.response_mode,
        }
    }
}

/// Where per-attempt records go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptSinkKind {
    #[default]
    Tracing,
    Jsonl,
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptLogConfig {
    #[serde(default)]
    pub sink: AttemptSinkKind,

    /// JSONL file; defaults to `attempts.jsonl` under the state directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AttemptLogConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "chorus").map(|dirs| {
                dirs.state_dir()
                    .unwrap_or_else(|| dirs.data_local_dir())
                    .join("attempts.jsonl")
            })
        })
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Backend(String, String),
    Generation(String),
    AttemptLog(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Backend(name, msg) => write!(f, "Backend '{}': {}", name, msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::AttemptLog(msg) => write!(f, "Attempt log: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl GenerationDefaults {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_length == 0 {
            return Err("max_length must be at least 1".to_string());
        }
        if self.candidate_count == 0 {
            return Err("candidate_count must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ChorusConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.generation.validate() {
            errors.push(ValidationError::Generation(e));
        }

        let mut names = HashSet::new();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                errors.push(ValidationError::Backend(
                    backend.name.clone(),
                    "Duplicate backend name".to_string(),
                ));
            }
            if !backend.enabled {
                continue;
            }
            if let Err(e) = backend.validate() {
                errors.push(ValidationError::Backend(backend.name.clone(), e));
            }
        }

        if self.attempt_log.sink == AttemptSinkKind::Jsonl
            && self.attempt_log.resolved_path().is_none()
        {
            errors.push(ValidationError::AttemptLog(
                "jsonl sink needs a path".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into one `ConfigError`.
    pub fn validate_or_error(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }

    /// Enabled backends in configured order, optionally restricted to `filter` names.
    ///
    /// A filter name that matches no configured backend is an error; naming a disabled
    /// backend explicitly selects it anyway.
    pub fn enabled_backends(&self, filter: &[String]) -> Result<Vec<BackendIdentity>, ApiError> {
        if filter.is_empty() {
            return Ok(self
                .backends
                .iter()
                .filter(|backend| backend.enabled)
                .map(BackendConfig::to_identity)
                .collect());
        }

        for name in filter {
            if !self.backends.iter().any(|backend| &backend.name == name) {
                return Err(ApiError::UnknownBackend(name.clone()));
            }
        }
        Ok(self
            .backends
            .iter()
            .filter(|backend| filter.contains(&backend.name))
            .map(BackendConfig::to_identity)
            .collect())
    }

    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|backend| backend.name == name)
    }
}

/// Builds a `ChorusConfig` from its layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    workspace_root: PathBuf,
    global_path: Option<PathBuf>,
    explicit_path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            global_path: global_config_path(),
            explicit_path: None,
            use_env: true,
        }
    }

    /// Override the global file location (or skip it with `None`).
    pub fn with_global_path(mut self, path: Option<PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    pub fn with_env(mut self, use_env: bool) -> Self {
        self.use_env = use_env;
        self
    }

    pub fn load(&self) -> Result<ChorusConfig, ApiError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder, self.global_path.as_deref())?;
        builder = sources::workspace_file::add_to_builder(builder, &self.workspace_root)?;
        if let Some(path) = &self.explicit_path {
            if !path.exists() {
                return Err(ApiError::ConfigError(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        if self.use_env {
            builder = sources::env_vars::add_to_builder(builder);
        }

        let config: ChorusConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single TOML file with defaults underneath.
    pub fn load_from_file(path: &Path) -> Result<ChorusConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true));
        Ok(builder.build()?.try_deserialize()?)
    }
}
