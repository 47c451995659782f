//! Backend identity: the read-only, per-backend runtime settings a session runs with.

use crate::extract::ResponseMode;
use crate::provider::ProviderType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendIdentity {
    pub name: String,
    pub provider_type: ProviderType,
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_mode: ResponseMode,
}

impl BackendIdentity {
    pub fn new(name: impl Into<String>, provider_type: ProviderType, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type,
            model: model.into(),
            endpoint: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
            max_tokens: None,
            response_mode: ResponseMode::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

// Credentials never reach logs through Debug.
impl fmt::Debug for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendIdentity")
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("response_mode", &self.response_mode)
            .finish()
    }
}
