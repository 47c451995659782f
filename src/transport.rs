//! Backend transports and the name-keyed strategy table the orchestrator dispatches through.

use crate::backend::BackendIdentity;
use crate::error::ApiError;
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient, ProviderFactory};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// One backend call: source text plus system prompt in, raw reply text out.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn invoke(
        &self,
        source_text: &str,
        system_prompt: &str,
        identity: &BackendIdentity,
    ) -> Result<String, ApiError>;
}

/// Adapts a chat-completion client into a transport.
pub struct ClientTransport {
    client: Box<dyn ModelProviderClient>,
}

impl ClientTransport {
    pub fn new(client: Box<dyn ModelProviderClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendTransport for ClientTransport {
    async fn invoke(
        &self,
        source_text: &str,
        system_prompt: &str,
        identity: &BackendIdentity,
    ) -> Result<String, ApiError> {
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(source_text),
        ];
        let response = self
            .client
            .complete(messages, CompletionOptions::from_identity(identity))
            .await?;
        Ok(response.content)
    }
}

type InvokeFn =
    dyn Fn(String, String, BackendIdentity) -> BoxFuture<'static, Result<String, ApiError>>
        + Send
        + Sync;

/// Transport backed by a plain function value.
pub struct FnTransport {
    invoke: Box<InvokeFn>,
}

impl FnTransport {
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(String, String, BackendIdentity) -> BoxFuture<'static, Result<String, ApiError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            invoke: Box::new(invoke),
        }
    }
}

#[async_trait]
impl BackendTransport for FnTransport {
    async fn invoke(
        &self,
        source_text: &str,
        system_prompt: &str,
        identity: &BackendIdentity,
    ) -> Result<String, ApiError> {
        (self.invoke)(
            source_text.to_string(),
            system_prompt.to_string(),
            identity.clone(),
        )
        .await
    }
}

/// Strategy table: backend name to transport, filled once at startup.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: HashMap<String, Arc<dyn BackendTransport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP transports for every identity through the provider factory.
    pub fn from_backends(backends: &[BackendIdentity]) -> Result<Self, ApiError> {
        let mut registry = Self::new();
        for identity in backends {
            let client = ProviderFactory::create_client(identity)?;
            registry.register(identity.name.clone(), Arc::new(ClientTransport::new(client)));
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, transport: Arc<dyn BackendTransport>) {
        self.transports.insert(name.into(), transport);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BackendTransport>> {
        self.transports.get(name).cloned()
    }

    pub fn get_or_error(&self, name: &str) -> Result<Arc<dyn BackendTransport>, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::UnknownBackend(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}
