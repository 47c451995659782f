//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::backend::BackendIdentity;
use crate::choice::{Choice, FinalState};
use crate::cli::parse::{Commands, GenerateArgs};
use crate::cli::presentation::{
    format_backend_list_json, format_backend_list_text, format_dispatch_banner,
    format_live_choice, format_run_summary, selection_items,
};
use crate::cli::command_name;
use crate::config::{ChorusConfig, ConfigLoader};
use crate::diff::{DiffSource, GitDiffSource};
use crate::error::ApiError;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::prompt::PromptBuilder;
use crate::sink::build_attempt_sink;
use crate::transport::TransportRegistry;
use crate::types::{GenerationRequest, MessageStyle, RequestKind};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace and merged configuration.
pub struct RunContext {
    config: ChorusConfig,
    workspace_root: PathBuf,
    color: bool,
}

impl RunContext {
    /// Load the layered configuration for `workspace_root`.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::new(&workspace_root)
            .with_explicit_path(config_path)
            .load()?;
        Ok(Self::from_config(config, workspace_root))
    }

    pub fn from_config(config: ChorusConfig, workspace_root: PathBuf) -> Self {
        let color = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            config,
            workspace_root,
            color,
        }
    }

    pub fn config(&self) -> &ChorusConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = match command {
            Commands::Commit(args) => self.handle_generate(RequestKind::Commit, args),
            Commands::Review(args) => self.handle_generate(RequestKind::Review, args),
            Commands::Backends { format } => self.handle_backends(format),
        };
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn handle_backends(&self, format: &str) -> Result<String, ApiError> {
        match format {
            "json" => Ok(format_backend_list_json(&self.config.backends)),
            "text" => Ok(format_backend_list_text(&self.config.backends)),
            other => Err(ApiError::InvalidRequest(format!(
                "Invalid format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }

    fn handle_generate(&self, kind: RequestKind, args: &GenerateArgs) -> Result<String, ApiError> {
        let backends = self.selected_backends(args)?;

        let source = GitDiffSource::discover(&self.workspace_root)?;
        let mut excludes = self.config.generation.exclude.clone();
        excludes.extend(args.exclude.iter().cloned());
        let Some(staged) = source.staged_diff(&excludes)? else {
            return Ok("No staged changes to summarize.".to_string());
        };
        debug!(files = staged.files.len(), "Staged files collected");

        let request = self.build_request(kind, args, staged.diff)?;
        let registry = TransportRegistry::from_backends(&backends)?;
        let sink = build_attempt_sink(&self.config.attempt_log)?;
        let mut orchestrator = Orchestrator::new(registry, Arc::new(self.prompt_builder()), sink);

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        let report = runtime.block_on(run_live(&mut orchestrator, request, backends, self.color))?;
        eprintln!("{}", format_run_summary(&report, self.color));

        if report.final_state == FinalState::AllFailed {
            return Err(if report.cancelled {
                ApiError::Cancelled
            } else {
                ApiError::NoUsableResult
            });
        }

        let message = select_message(&report, args.yes || !std::io::stdin().is_terminal())?;
        match kind {
            RequestKind::Commit if !args.dry_run => {
                source.commit(&message)?;
                let subject = message.lines().next().unwrap_or_default();
                Ok(format!("Committed: {}", subject))
            }
            _ => Ok(message),
        }
    }

    /// Backends chosen on the command line (or all enabled ones), each validated.
    fn selected_backends(&self, args: &GenerateArgs) -> Result<Vec<BackendIdentity>, ApiError> {
        self.config
            .generation
            .validate()
            .map_err(ApiError::ConfigError)?;
        let backends = self.config.enabled_backends(&args.backends)?;
        if backends.is_empty() {
            return Err(ApiError::NoBackends);
        }
        for identity in &backends {
            if let Some(backend) = self.config.backend(&identity.name) {
                backend.validate().map_err(|e| {
                    ApiError::ConfigError(format!("Backend '{}': {}", backend.name, e))
                })?;
            }
        }
        Ok(backends)
    }

    fn build_request(
        &self,
        kind: RequestKind,
        args: &GenerateArgs,
        source_text: String,
    ) -> Result<GenerationRequest, ApiError> {
        let defaults = &self.config.generation;
        let style = match &args.style {
            Some(style) => style.parse::<MessageStyle>()?,
            None => defaults.message_style,
        };
        GenerationRequest::new(
            source_text,
            kind,
            args.locale.clone().unwrap_or_else(|| defaults.locale.clone()),
            args.max_length.unwrap_or(defaults.max_length),
            args.count.unwrap_or(defaults.candidate_count),
            style,
            args.body || defaults.include_body,
        )
    }

    fn prompt_builder(&self) -> PromptBuilder {
        let mut builder = PromptBuilder::new();
        if let Some(template) = &self.config.generation.commit_template {
            builder = builder.with_commit_template(template.clone());
        }
        if let Some(template) = &self.config.generation.review_template {
            builder = builder.with_review_template(template.clone());
        }
        builder
    }
}

/// Dispatch, echo every choice to stderr as it lands, and cancel on Ctrl-C.
async fn run_live(
    orchestrator: &mut Orchestrator,
    request: GenerationRequest,
    backends: Vec<BackendIdentity>,
    color: bool,
) -> Result<RunReport, ApiError> {
    let names: Vec<String> = backends.iter().map(|b| b.name.clone()).collect();
    eprintln!(
        "{}",
        format_dispatch_banner(request.request_kind.as_str(), &names, color)
    );

    let mut handle = orchestrator.start(request, backends).await?;
    let cancel = handle.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(choice) = handle.next_choice().await {
        eprintln!("{}", format_live_choice(&choice, color));
    }
    ctrl_c.abort();
    handle.finish().await
}

/// Pick the message to use: the first usable one, or whatever the user selects.
fn select_message(report: &RunReport, take_first: bool) -> Result<String, ApiError> {
    let selectable: Vec<&Choice> = report.selectable().collect();
    let first = selectable.first().ok_or(ApiError::NoUsableResult)?;
    if take_first {
        return Ok(first.value.clone());
    }

    let items = selection_items(report);
    let picked = dialoguer::Select::new()
        .with_prompt("Pick a message")
        .items(&items)
        .default(0)
        .interact_opt()
        .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;
    match picked {
        Some(index) => Ok(selectable[index].value.clone()),
        None => Err(ApiError::Cancelled),
    }
}
