//! Attempt log sinks: one structured record per backend attempt, best effort.

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::config::{AttemptLogConfig, AttemptSinkKind};
use crate::error::ApiError;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub ts: String,
    pub request_id: String,
    pub request_kind: String,
    pub backend: String,
    pub model: String,
    pub duration_ms: u128,
    pub ok: bool,
    pub candidate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn now_ts() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Receives attempt records. Implementations must not block or panic.
pub trait AttemptSink: Send + Sync {
    fn record(&self, entry: AttemptRecord);
}

pub struct NoopSink;

impl AttemptSink for NoopSink {
    fn record(&self, _entry: AttemptRecord) {}
}

/// Emits each attempt as a structured tracing event.
pub struct TracingSink;

impl AttemptSink for TracingSink {
    fn record(&self, entry: AttemptRecord) {
        if entry.ok {
            info!(
                target: "chorus::attempt",
                request_id = %entry.request_id,
                request_kind = %entry.request_kind,
                backend = %entry.backend,
                model = %entry.model,
                duration_ms = entry.duration_ms as u64,
                candidates = entry.candidate_count,
                "backend attempt succeeded"
            );
        } else {
            warn!(
                target: "chorus::attempt",
                request_id = %entry.request_id,
                request_kind = %entry.request_kind,
                backend = %entry.backend,
                model = %entry.model,
                duration_ms = entry.duration_ms as u64,
                failure_kind = entry.failure_kind.as_deref().unwrap_or("unknown"),
                error = entry.error.as_deref().unwrap_or(""),
                "backend attempt failed"
            );
        }
    }
}

/// Appends one JSON line per attempt from a background writer thread.
pub struct JsonlFileSink {
    path: PathBuf,
    sender: Mutex<Option<Sender<AttemptRecord>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl JsonlFileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = channel::<AttemptRecord>();
        let writer_path = path.clone();
        let writer = std::thread::Builder::new()
            .name("chorus-attempt-log".to_string())
            .spawn(move || {
                let mut out = BufWriter::new(file);
                for record in receiver {
                    let written = serde_json::to_string(&record)
                        .map_err(std::io::Error::from)
                        .and_then(|line| writeln!(out, "{}", line))
                        .and_then(|_| out.flush());
                    if let Err(e) = written {
                        warn!(path = %writer_path.display(), error = %e, "Failed to write attempt record");
                    }
                }
            })?;

        Ok(Self {
            path,
            sender: Mutex::new(Some(sender)),
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting records and wait for queued ones to be written.
    pub fn close(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                warn!(path = %self.path.display(), "Attempt log writer panicked");
            }
        }
    }
}

impl AttemptSink for JsonlFileSink {
    fn record(&self, entry: AttemptRecord) {
        if let Some(sender) = self.sender.lock().as_ref() {
            // Writer gone means the log is closed; dropping the record is fine.
            let _ = sender.send(entry);
        }
    }
}

impl Drop for JsonlFileSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the configured sink; `None` when attempt logging is off.
pub fn build_attempt_sink(
    config: &AttemptLogConfig,
) -> Result<Option<Arc<dyn AttemptSink>>, ApiError> {
    match config.sink {
        AttemptSinkKind::None => Ok(None),
        AttemptSinkKind::Tracing => Ok(Some(Arc::new(TracingSink))),
        AttemptSinkKind::Jsonl => {
            let path = config.resolved_path().ok_or_else(|| {
                ApiError::ConfigError("Attempt log path could not be resolved".to_string())
            })?;
            Ok(Some(Arc::new(JsonlFileSink::open(path)?)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(backend: &str, ok: bool) -> AttemptRecord {
        AttemptRecord {
            ts: AttemptRecord::now_ts(),
            request_id: "r1".to_string(),
            request_kind: "commit".to_string(),
            backend: backend.to_string(),
            model: "m".to_string(),
            duration_ms: 12,
            ok,
            candidate_count: usize::from(ok),
            failure_kind: (!ok).then(|| "timeout".to_string()),
            prompt: "prompt".to_string(),
            reply: ok.then(|| "{\"subject\":\"x\"}".to_string()),
            error: None,
        }
    }

    #[test]
    fn test_jsonl_sink_writes_one_line_per_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("attempts.jsonl");
        let sink = JsonlFileSink::open(&path).unwrap();
        sink.record(record("a", true));
        sink.record(record("b", false));
        sink.close();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<AttemptRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].backend, "a");
        assert_eq!(lines[1].failure_kind.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_records_after_close_are_dropped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("attempts.jsonl");
        let sink = JsonlFileSink::open(&path).unwrap();
        sink.close();
        sink.record(record("late", true));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_sink_kind_selects_implementation() {
        let off = AttemptLogConfig {
            sink: AttemptSinkKind::None,
            path: None,
        };
        assert!(build_attempt_sink(&off).unwrap().is_none());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        let jsonl = AttemptLogConfig {
            sink: AttemptSinkKind::Jsonl,
            path: Some(path.clone()),
        };
        let sink = build_attempt_sink(&jsonl).unwrap().unwrap();
        sink.record(record("x", true));
        drop(sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_timestamp_is_rfc3339_millis() {
        let ts = AttemptRecord::now_ts();
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
    }
}
