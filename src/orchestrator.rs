//! Orchestrator
//!
//! Fans one `GenerationRequest` out to every selected backend, one task per backend,
//! and fans the outcomes back in through a single channel. A single aggregator task is
//! the only writer of the run's `ChoiceListModel`, so appends are serialized without
//! locking on the hot path and the final all-failed scan can never race the last append.

use crate::backend::BackendIdentity;
use crate::choice::{finalize, Choice, ChoiceListModel, FinalState};
use crate::error::ApiError;
use crate::prompt::PromptBuilder;
use crate::session::{display_message, BackendSession, FailureKind, Outcome};
use crate::sink::AttemptSink;
use crate::transport::TransportRegistry;
use crate::types::GenerationRequest;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of one run. `Finalized` is reached exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorLifecycle {
    NotStarted,
    Dispatching,
    Draining,
    Finalized,
}

/// Counters for a run, updated by the aggregator as outcomes arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunProgress {
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn pending(&self) -> usize {
        self.dispatched.saturating_sub(self.completed())
    }
}

/// Delivered once, when the run is finalized.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub final_state: FinalState,
    pub choices: Vec<Choice>,
    pub cancelled: bool,
    pub progress: RunProgress,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn selectable(&self) -> impl Iterator<Item = &Choice> {
        self.choices.iter().filter(|choice| choice.is_selectable())
    }
}

/// What a session task hands back to the aggregator.
struct SessionReport {
    slot: usize,
    backend: String,
    outcome: Outcome,
}

/// Bookkeeping the orchestrator keeps for the run it may have to supersede.
struct ActiveRun {
    cancel: CancellationToken,
    lifecycle: watch::Receiver<OrchestratorLifecycle>,
}

/// Runs at most one fan-out at a time.
pub struct Orchestrator {
    registry: TransportRegistry,
    prompts: Arc<PromptBuilder>,
    sink: Option<Arc<dyn AttemptSink>>,
    active: Option<ActiveRun>,
}

impl Orchestrator {
    pub fn new(
        registry: TransportRegistry,
        prompts: Arc<PromptBuilder>,
        sink: Option<Arc<dyn AttemptSink>>,
    ) -> Self {
        Self {
            registry,
            prompts,
            sink,
            active: None,
        }
    }

    /// Lifecycle of the most recent run, or `NotStarted`.
    pub fn lifecycle(&self) -> OrchestratorLifecycle {
        self.active
            .as_ref()
            .map(|run| *run.lifecycle.borrow())
            .unwrap_or(OrchestratorLifecycle::NotStarted)
    }

    /// Cancel the current run, if any. Does not wait for it to finalize.
    pub fn cancel(&self) {
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }

    /// Dispatch `request` to every backend concurrently.
    ///
    /// Empty or unknown backend lists are rejected before anything is spawned. A run
    /// still in flight is cancelled and awaited until finalized first.
    pub async fn start(
        &mut self,
        request: GenerationRequest,
        backends: Vec<BackendIdentity>,
    ) -> Result<RunHandle, ApiError> {
        if backends.is_empty() {
            return Err(ApiError::NoBackends);
        }
        let mut sessions = Vec::with_capacity(backends.len());
        for identity in backends {
            let transport = self.registry.get_or_error(&identity.name)?;
            sessions.push(BackendSession::new(
                identity,
                transport,
                Arc::clone(&self.prompts),
                self.sink.clone(),
            ));
        }

        self.supersede().await;

        let cancel = CancellationToken::new();
        let (lifecycle_tx, lifecycle_rx) = watch::channel(OrchestratorLifecycle::NotStarted);
        let model = Arc::new(Mutex::new(ChoiceListModel::new()));
        let live = model.lock().subscribe();
        let progress = Arc::new(RwLock::new(RunProgress::default()));
        let request = Arc::new(request);

        info!(
            request_id = %request.request_id,
            request_kind = %request.request_kind,
            backends = sessions.len(),
            "Dispatching generation request"
        );
        lifecycle_tx.send_replace(OrchestratorLifecycle::Dispatching);

        let (report_tx, report_rx) = unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut pending = Vec::with_capacity(sessions.len());
        for (slot, session) in sessions.into_iter().enumerate() {
            pending.push(Some(session.identity().name.clone()));
            spawn_session(
                &mut tasks,
                slot,
                session,
                Arc::clone(&request),
                cancel.child_token(),
                report_tx.clone(),
            );
        }
        drop(report_tx);
        progress.write().dispatched = pending.len();

        lifecycle_tx.send_replace(OrchestratorLifecycle::Draining);

        let aggregator = Aggregator {
            request_id: request.request_id.clone(),
            model: Arc::clone(&model),
            progress: Arc::clone(&progress),
            lifecycle: lifecycle_tx,
            cancel: cancel.clone(),
            pending,
            started: Instant::now(),
        };
        let join = tokio::spawn(aggregator.run(report_rx, tasks));

        self.active = Some(ActiveRun {
            cancel: cancel.clone(),
            lifecycle: lifecycle_rx.clone(),
        });

        Ok(RunHandle {
            live,
            cancel,
            lifecycle: lifecycle_rx,
            model,
            progress,
            join: Some(join),
        })
    }

    async fn supersede(&mut self) {
        let Some(mut run) = self.active.take() else {
            return;
        };
        if *run.lifecycle.borrow() == OrchestratorLifecycle::Finalized {
            return;
        }
        debug!("Cancelling in-flight run before starting a new one");
        run.cancel.cancel();
        wait_finalized(&mut run.lifecycle).await;
    }
}

fn spawn_session(
    tasks: &mut JoinSet<()>,
    slot: usize,
    mut session: BackendSession,
    request: Arc<GenerationRequest>,
    cancel: CancellationToken,
    reports: UnboundedSender<SessionReport>,
) {
    tasks.spawn(async move {
        let run = AssertUnwindSafe(session.run(&request, &cancel))
            .catch_unwind()
            .await;
        let outcome = match run {
            Ok(outcome) => outcome,
            Err(payload) => panicked_outcome(&session.identity().name, payload.as_ref()),
        };
        let report = SessionReport {
            slot,
            backend: session.identity().name.clone(),
            outcome,
        };
        // A closed channel means the run already finalized; the outcome is discarded.
        if reports.send(report).is_err() {
            debug!(backend = %session.identity().name, "Discarding late backend outcome");
        }
    });
}

/// A session that panicked still reports, in arrival order, as an `Unknown` failure.
fn panicked_outcome(backend: &str, payload: &(dyn Any + Send)) -> Outcome {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    warn!(backend = %backend, panic = %detail, "Backend session panicked");
    let error = ApiError::ProviderError(format!("backend session panicked: {}", detail));
    Outcome::Failure {
        kind: FailureKind::Unknown,
        display_message: display_message(FailureKind::Unknown, &error),
        raw: Arc::new(error),
    }
}

async fn wait_finalized(lifecycle: &mut watch::Receiver<OrchestratorLifecycle>) {
    while *lifecycle.borrow_and_update() != OrchestratorLifecycle::Finalized {
        if lifecycle.changed().await.is_err() {
            break;
        }
    }
}

/// The single consumer of session reports.
struct Aggregator {
    request_id: String,
    model: Arc<Mutex<ChoiceListModel>>,
    progress: Arc<RwLock<RunProgress>>,
    lifecycle: watch::Sender<OrchestratorLifecycle>,
    cancel: CancellationToken,
    pending: Vec<Option<String>>,
    started: Instant,
}

impl Aggregator {
    async fn run(
        mut self,
        mut reports: UnboundedReceiver<SessionReport>,
        mut tasks: JoinSet<()>,
    ) -> RunReport {
        let mut cancelled = false;

        while self.pending.iter().any(Option::is_some) {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                report = reports.recv() => match report {
                    Some(report) => self.accept(report),
                    None => {
                        self.abandon_pending();
                        break;
                    }
                },
            }
        }

        // Nothing appended after this point: late senders see a closed channel.
        reports.close();
        tasks.abort_all();

        let choices = self.model.lock().snapshot();
        let final_state = finalize(&choices);
        let progress = *self.progress.read();
        let elapsed = self.started.elapsed();

        info!(
            request_id = %self.request_id,
            final_state = ?final_state,
            cancelled,
            succeeded = progress.succeeded,
            failed = progress.failed,
            choices = choices.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Generation run finalized"
        );
        self.lifecycle.send_replace(OrchestratorLifecycle::Finalized);
        self.model.lock().close_observers();

        RunReport {
            final_state,
            choices,
            cancelled,
            progress,
            elapsed,
        }
    }

    fn accept(&mut self, report: SessionReport) {
        let Some(expected) = self.pending.get_mut(report.slot).and_then(Option::take) else {
            warn!(backend = %report.backend, "Ignoring duplicate backend report");
            return;
        };
        debug_assert_eq!(expected, report.backend);

        {
            let mut progress = self.progress.write();
            if report.outcome.is_success() {
                progress.succeeded += 1;
            } else {
                progress.failed += 1;
            }
        }

        let mut model = self.model.lock();
        for choice in Choice::from_outcome(&report.backend, &report.outcome) {
            model.append(choice);
        }
    }

    /// Every sender is gone but some backends never reported, so their tasks were
    /// aborted before they could.
    fn abandon_pending(&mut self) {
        let missing: Vec<String> = self.pending.iter_mut().filter_map(Option::take).collect();
        let mut model = self.model.lock();
        let mut progress = self.progress.write();
        for backend in missing {
            warn!(backend = %backend, "Backend task ended without reporting");
            progress.failed += 1;
            model.append(Choice::from_failure(
                &backend,
                "Generation failed (session ended without reporting)",
            ));
        }
    }
}

/// Caller's side of one run: live choices, cancellation and the final report.
pub struct RunHandle {
    live: UnboundedReceiver<Choice>,
    cancel: CancellationToken,
    lifecycle: watch::Receiver<OrchestratorLifecycle>,
    model: Arc<Mutex<ChoiceListModel>>,
    progress: Arc<RwLock<RunProgress>>,
    join: Option<JoinHandle<RunReport>>,
}

impl RunHandle {
    /// Next appended choice, or `None` once the run is finalized.
    pub async fn next_choice(&mut self) -> Option<Choice> {
        self.live.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run when triggered, e.g. from a Ctrl-C handler.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn lifecycle(&self) -> OrchestratorLifecycle {
        *self.lifecycle.borrow()
    }

    pub fn lifecycle_watch(&self) -> watch::Receiver<OrchestratorLifecycle> {
        self.lifecycle.clone()
    }

    pub fn progress(&self) -> RunProgress {
        *self.progress.read()
    }

    /// Current choices, in arrival order.
    pub fn snapshot(&self) -> Vec<Choice> {
        self.model.lock().snapshot()
    }

    /// Wait for the run to finalize and return its report.
    pub async fn finish(mut self) -> Result<RunReport, ApiError> {
        let Some(join) = self.join.take() else {
            return Err(ApiError::InvalidRequest("Run already finished".to_string()));
        };
        join.await.map_err(|e| {
            if e.is_cancelled() {
                ApiError::Cancelled
            } else {
                ApiError::ProviderError(format!("Aggregator task failed: {}", e))
            }
        })
    }
}
