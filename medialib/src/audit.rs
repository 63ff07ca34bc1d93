//! Write-only audit sink for job lifecycle events.
//!
//! Auditing is best-effort: a sink failure is logged and the job
//! carries on. Nothing in the core ever reads these events back.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{JobId, JobKind};

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
    pub owner: String,
    pub operation: JobKind,
    pub source_filename: String,
    /// `started`, `completed`, or `failed: <detail>`.
    pub event: String,
}

impl AuditEvent {
    pub fn new(
        job_id: JobId,
        owner: &str,
        operation: JobKind,
        source_filename: &str,
        event: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            job_id,
            owner: owner.to_string(),
            operation,
            source_filename: source_filename.to_string(),
            event: event.into(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Appends one JSON object per line. Both the server and each worker
/// process append to the same file; entries are single `write` calls on
/// an `O_APPEND` descriptor, so lines never interleave.
pub struct JsonlAuditSink {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) {
        let _guard = self.guard.lock().expect("audit lock poisoned");
        let result = serde_json::to_string(event).map(|line| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .and_then(|mut f| writeln!(f, "{line}"))
        });
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(job_id = %event.job_id, error = %e, "failed to append audit event")
            }
            Err(e) => {
                tracing::warn!(job_id = %event.job_id, error = %e, "failed to encode audit event")
            }
        }
    }
}

/// Discards everything; used by tests that do not care about auditing.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn events_land_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path);
        let id = Uuid::new_v4();
        sink.record(&AuditEvent::new(
            id,
            "user-1",
            JobKind::Subtitle,
            "clip.mp4",
            "started",
        ));
        sink.record(&AuditEvent::new(
            id,
            "user-1",
            JobKind::Subtitle,
            "clip.mp4",
            "failed: mux: ffmpeg exited with status 1",
        ));

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "started");
        assert_eq!(first["operation"], "subtitle");
        assert_eq!(first["job_id"], id.to_string());
    }
}
