//! Model Provider Abstraction
//!
//! Unified interface for the HTTP backends chorus can fan out to (OpenAI, Anthropic,
//! local models via Ollama, custom OpenAI-compatible servers). Each client maps its
//! provider's HTTP failures onto the shared `ApiError` provider variants so that the
//! session layer can classify failures without backend-specific knowledge.

use crate::backend::BackendIdentity;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Provider family of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
            ProviderType::LocalCustom => "local",
        }
    }

    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("https://api.openai.com/v1"),
            ProviderType::Anthropic => Some("https://api.anthropic.com/v1"),
            ProviderType::Ollama => Some("http://localhost:11434/v1"),
            ProviderType::LocalCustom => None,
        }
    }

    pub fn api_key_env_var(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Ollama | ProviderType::LocalCustom => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "ollama" => Ok(ProviderType::Ollama),
            "local" => Ok(ProviderType::LocalCustom),
            _ => Err(ApiError::ConfigError(format!(
                "Invalid provider type: {}. Must be openai, anthropic, ollama, or local",
                s
            ))),
        }
    }
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Completion options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn from_identity(identity: &BackendIdentity) -> Self {
        Self {
            temperature: identity.temperature,
            max_tokens: identity.max_tokens,
        }
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

fn role_to_string(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

/// Map transport-level reqwest failures to ApiError.
fn map_http_error(error: reqwest::Error, timeout: Duration) -> ApiError {
    if error.is_timeout() {
        ApiError::ProviderTimeout(timeout.as_millis() as u64)
    } else if error.is_connect() {
        ApiError::ProviderConnection(error.to_string())
    } else if let Some(status) = error.status() {
        map_status_error(status, &error.to_string())
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

/// Map a non-success HTTP status plus body text to ApiError.
pub fn map_status_error(status: StatusCode, body: &str) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::ProviderAuthFailed(format!("status {}: {}", status, body)),
        429 => ApiError::ProviderRateLimit(format!("status {}: {}", status, body)),
        404 => ApiError::ProviderModelNotFound(format!("status {}: {}", status, body)),
        _ => ApiError::ProviderRequestFailed(format!("status {}: {}", status, body)),
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_provider_http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}

/// Client for OpenAI-style `/chat/completions` endpoints (OpenAI, Ollama, local servers).
pub struct OpenAICompatibleClient {
    client: Client,
    provider: ProviderType,
    model: String,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    pub fn new(
        provider: ProviderType,
        model: String,
        api_key: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = build_provider_http_client(timeout)?;
        Ok(Self {
            client,
            provider,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ModelProviderClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .into_iter()
                .map(|msg| OpenAIMessage {
                    role: role_to_string(msg.role).to_string(),
                    content: msg.content,
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| map_http_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(map_status_error(status, &error_body(response).await));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::ProviderError("No choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content,
            model: completion.model,
            finish_reason: choice.finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic messages API client
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn new(
        model: String,
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = build_provider_http_client(timeout)?;
        Ok(Self {
            client,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ModelProviderClient for AnthropicClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let system = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let turns: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| json!({ "role": role_to_string(m.role), "content": m.content }))
            .collect();

        let mut request_body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(1024),
            "messages": turns,
        });
        if !system.is_empty() {
            request_body["system"] = json!(system);
        }
        if let Some(temp) = options.temperature {
            request_body["temperature"] = json!(temp);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| map_http_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(map_status_error(status, &error_body(response).await));
        }

        #[derive(Deserialize)]
        struct MessagesResponse {
            model: String,
            content: Vec<ContentBlock>,
            stop_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: Option<String>,
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let content: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if content.is_empty() {
            return Err(ApiError::ProviderError(
                "No text content in response".to_string(),
            ));
        }

        Ok(CompletionResponse {
            content,
            model: parsed.model,
            finish_reason: parsed.stop_reason,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Provider factory for creating provider clients
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        identity: &BackendIdentity,
    ) -> Result<Box<dyn ModelProviderClient>, ApiError> {
        let provider = identity.provider_type;
        let endpoint = identity
            .endpoint
            .clone()
            .or_else(|| provider.default_endpoint().map(str::to_string))
            .ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "Backend '{}' requires an endpoint",
                    identity.name
                ))
            })?;

        match provider {
            ProviderType::Anthropic => {
                let api_key = identity.api_key.clone().ok_or_else(|| {
                    ApiError::ConfigError(format!(
                        "Backend '{}' requires an API key",
                        identity.name
                    ))
                })?;
                Ok(Box::new(AnthropicClient::new(
                    identity.model.clone(),
                    api_key,
                    endpoint,
                    identity.timeout,
                )?))
            }
            ProviderType::OpenAI | ProviderType::Ollama | ProviderType::LocalCustom => {
                Ok(Box::new(OpenAICompatibleClient::new(
                    provider,
                    identity.model.clone(),
                    identity.api_key.clone(),
                    endpoint,
                    identity.timeout,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_round_trip() {
        for provider in [
            ProviderType::OpenAI,
            ProviderType::Anthropic,
            ProviderType::Ollama,
            ProviderType::LocalCustom,
        ] {
            assert_eq!(provider.as_str().parse::<ProviderType>().unwrap(), provider);
        }
        assert!("bedrock".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_provider_type_serialization() {
        let serialized = serde_json::to_string(&ProviderType::LocalCustom).unwrap();
        assert_eq!(serialized, "\"local\"");
        let parsed: ProviderType = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(parsed, ProviderType::OpenAI);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status_error(StatusCode::UNAUTHORIZED, "bad key"),
            ApiError::ProviderAuthFailed(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::FORBIDDEN, "denied"),
            ApiError::ProviderAuthFailed(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ApiError::ProviderRateLimit(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::NOT_FOUND, "no model"),
            ApiError::ProviderModelNotFound(_)
        ));
        match map_status_error(StatusCode::SERVICE_UNAVAILABLE, "overloaded") {
            ApiError::ProviderRequestFailed(msg) => assert!(msg.contains("503")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_provider_factory_openai() {
        let identity = BackendIdentity::new("gpt", ProviderType::OpenAI, "gpt-4o-mini")
            .with_api_key("test-key");
        let client = ProviderFactory::create_client(&identity).unwrap();
        assert_eq!(client.provider_name(), "openai");
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_provider_factory_anthropic_requires_key() {
        let identity = BackendIdentity::new("claude", ProviderType::Anthropic, "claude-3-haiku");
        assert!(ProviderFactory::create_client(&identity).is_err());

        let identity = identity.with_api_key("test-key");
        let client = ProviderFactory::create_client(&identity).unwrap();
        assert_eq!(client.provider_name(), "anthropic");
    }

    #[test]
    fn test_provider_factory_ollama() {
        let identity = BackendIdentity::new("local-llama", ProviderType::Ollama, "llama3");
        let client = ProviderFactory::create_client(&identity).unwrap();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.model_name(), "llama3");
    }

    #[test]
    fn test_provider_factory_custom_local_requires_endpoint() {
        let identity = BackendIdentity::new("lm", ProviderType::LocalCustom, "custom");
        assert!(ProviderFactory::create_client(&identity).is_err());

        let identity = identity.with_endpoint("http://localhost:8080/v1");
        let client = ProviderFactory::create_client(&identity).unwrap();
        assert_eq!(client.provider_name(), "local");
    }

    #[test]
    fn test_message_role_serialization() {
        let msg = ChatMessage::system("hello");
        let serialized = serde_json::to_string(&msg).unwrap();
        assert!(serialized.contains("System"));
    }
}
