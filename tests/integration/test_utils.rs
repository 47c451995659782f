//! Shared test utilities for integration tests
//!
//! Scripted transports standing in for real backends, plus request and orchestrator
//! builders so each scenario only states what differs.

use chorus::backend::BackendIdentity;
use chorus::error::ApiError;
use chorus::orchestrator::Orchestrator;
use chorus::prompt::PromptBuilder;
use chorus::provider::ProviderType;
use chorus::sink::AttemptSink;
use chorus::transport::{BackendTransport, FnTransport, TransportRegistry};
use chorus::types::{GenerationRequest, MessageStyle, RequestKind};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;

/// What a scripted backend does once called.
#[derive(Clone)]
pub enum Script {
    Reply(&'static str),
    Fail(fn() -> ApiError),
}

pub struct ScriptedBackend {
    pub name: &'static str,
    pub delay: Duration,
    pub script: Script,
}

impl ScriptedBackend {
    pub fn reply(name: &'static str, delay_ms: u64, reply: &'static str) -> Self {
        Self {
            name,
            delay: Duration::from_millis(delay_ms),
            script: Script::Reply(reply),
        }
    }

    pub fn fail(name: &'static str, delay_ms: u64, error: fn() -> ApiError) -> Self {
        Self {
            name,
            delay: Duration::from_millis(delay_ms),
            script: Script::Fail(error),
        }
    }

    pub fn transport(&self) -> Arc<dyn BackendTransport> {
        let delay = self.delay;
        let script = self.script.clone();
        Arc::new(FnTransport::new(move |_, _, _| {
            let script = script.clone();
            async move {
                tokio::time::sleep(delay).await;
                match script {
                    Script::Reply(text) => Ok(text.to_string()),
                    Script::Fail(make) => Err(make()),
                }
            }
            .boxed()
        }))
    }

    pub fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(self.name, ProviderType::Ollama, "scripted")
            .with_timeout(Duration::from_secs(30))
    }
}

pub fn commit_request(style: MessageStyle) -> GenerationRequest {
    GenerationRequest::new(
        "diff --git a/src/parser.rs b/src/parser.rs\n+fn repair() {}\n",
        RequestKind::Commit,
        "en",
        72,
        3,
        style,
        false,
    )
    .unwrap()
}

pub fn orchestrator_for(
    backends: &[ScriptedBackend],
    sink: Option<Arc<dyn AttemptSink>>,
) -> (Orchestrator, Vec<BackendIdentity>) {
    let mut registry = TransportRegistry::new();
    for backend in backends {
        registry.register(backend.name, backend.transport());
    }
    let identities = backends.iter().map(ScriptedBackend::identity).collect();
    (
        Orchestrator::new(registry, Arc::new(PromptBuilder::new()), sink),
        identities,
    )
}
