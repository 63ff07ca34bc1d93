//! Durable per-job status records, one small JSON file per job.
//!
//! The ledger is the only channel through which callers observe job
//! progress. Exactly one process writes a given job's record at a time,
//! so no locking is needed; atomicity toward concurrent readers comes
//! from writing a temp file and renaming it into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::JobId;

/// Lifecycle state of a job. `Complete` and `Failed` are terminal; the
/// ledger refuses to move a job out of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing { stage: String, detail: String },
    Complete,
    Failed { detail: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed { .. })
    }
}

/// What actually lands on disk: the status plus a heartbeat timestamp,
/// refreshed on every transition. The reaper uses the heartbeat to spot
/// jobs whose worker died without reporting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusRecord {
    pub job_id: JobId,
    #[serde(flatten)]
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct StatusLedger {
    root: PathBuf,
}

impl StatusLedger {
    /// Open the ledger rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn record_path(&self, id: JobId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Record a new status for `id`, superseding the previous value.
    ///
    /// Terminal records are final: a write against a job that is already
    /// `Complete` or `Failed` is silently dropped, which keeps the
    /// observed status sequence monotonic even if a late writer races
    /// the reaper.
    pub fn write(&self, id: JobId, status: JobStatus) -> Result<()> {
        if let Some(existing) = self.read_record(id)? {
            if existing.status.is_terminal() {
                tracing::debug!(job_id = %id, ?status, "dropping write against terminal record");
                return Ok(());
            }
        }
        let record = StatusRecord {
            job_id: id,
            status,
            updated_at: Utc::now(),
        };
        let tmp = self.root.join(format!("{id}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec(&record)?)?;
        fs::rename(&tmp, self.record_path(id))?;
        Ok(())
    }

    /// Refresh the heartbeat without changing the status, so a long
    /// running stage is not mistaken for a lost worker. A no-op for
    /// unwritten or terminal records.
    pub fn touch(&self, id: JobId) -> Result<()> {
        match self.read_record(id)? {
            Some(record) if !record.status.is_terminal() => self.write(id, record.status),
            _ => Ok(()),
        }
    }

    /// Read the raw record, `None` when the job has never been written.
    pub fn read_record(&self, id: JobId) -> Result<Option<StatusRecord>> {
        match fs::read(self.record_path(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the status for `id`. A job with no record yet reads as
    /// `Pending`: this covers the window between submission returning
    /// and the worker's first write.
    pub fn read(&self, id: JobId) -> Result<JobStatus> {
        Ok(self
            .read_record(id)?
            .map(|r| r.status)
            .unwrap_or(JobStatus::Pending))
    }

    /// Remove the record. A no-op when it is already gone.
    pub fn remove(&self, id: JobId) -> io::Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Jobs that are not terminal and whose heartbeat is older than
    /// `older_than`. Corrupt or foreign files in the ledger directory
    /// are skipped, not fatal.
    pub fn stale_jobs(&self, older_than: Duration) -> io::Result<Vec<JobId>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than.as_secs() as i64);
        let mut stale = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(record) = read_record_file(&path) else {
                continue;
            };
            if !record.status.is_terminal() && record.updated_at < cutoff {
                stale.push(record.job_id);
            }
        }
        Ok(stale)
    }
}

fn read_record_file(path: &Path) -> Option<StatusRecord> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ledger() -> (tempfile::TempDir, StatusLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = StatusLedger::open(dir.path().join("status")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn unknown_job_reads_as_pending() {
        let (_dir, ledger) = ledger();
        assert_eq!(ledger.read(Uuid::new_v4()).unwrap(), JobStatus::Pending);
        assert!(ledger.read_record(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn writes_supersede_and_round_trip() {
        let (_dir, ledger) = ledger();
        let id = Uuid::new_v4();
        ledger.write(id, JobStatus::Pending).unwrap();
        ledger
            .write(
                id,
                JobStatus::Processing {
                    stage: "transcribe".into(),
                    detail: "requesting transcription".into(),
                },
            )
            .unwrap();
        match ledger.read(id).unwrap() {
            JobStatus::Processing { stage, .. } => assert_eq!(stage, "transcribe"),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn terminal_records_are_final() {
        let (_dir, ledger) = ledger();
        let id = Uuid::new_v4();
        ledger
            .write(
                id,
                JobStatus::Failed {
                    detail: "transcode: missing codec".into(),
                },
            )
            .unwrap();
        // a late Processing write from a lost worker must not regress the status
        ledger
            .write(
                id,
                JobStatus::Processing {
                    stage: "transcode".into(),
                    detail: "late".into(),
                },
            )
            .unwrap();
        assert_eq!(
            ledger.read(id).unwrap(),
            JobStatus::Failed {
                detail: "transcode: missing codec".into()
            }
        );
    }

    #[test]
    fn touch_refreshes_the_heartbeat_only() {
        let (_dir, ledger) = ledger();
        let id = Uuid::new_v4();
        ledger
            .write(
                id,
                JobStatus::Processing {
                    stage: "separate".into(),
                    detail: "separating stems".into(),
                },
            )
            .unwrap();
        let before = ledger.read_record(id).unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        ledger.touch(id).unwrap();
        let after = ledger.read_record(id).unwrap().unwrap();
        assert_eq!(after.status, before.status);
        assert!(after.updated_at > before.updated_at);

        // terminal and unwritten records are untouched
        let done = Uuid::new_v4();
        ledger.write(done, JobStatus::Complete).unwrap();
        let sealed = ledger.read_record(done).unwrap().unwrap();
        ledger.touch(done).unwrap();
        assert_eq!(
            ledger.read_record(done).unwrap().unwrap().updated_at,
            sealed.updated_at
        );
        let unknown = Uuid::new_v4();
        ledger.touch(unknown).unwrap();
        assert!(ledger.read_record(unknown).unwrap().is_none());
    }

    #[test]
    fn no_temp_files_left_behind() {
        let (_dir, ledger) = ledger();
        let id = Uuid::new_v4();
        ledger.write(id, JobStatus::Pending).unwrap();
        let leftovers: Vec<_> = fs::read_dir(&ledger.root)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, ledger) = ledger();
        let id = Uuid::new_v4();
        ledger.write(id, JobStatus::Complete).unwrap();
        ledger.remove(id).unwrap();
        ledger.remove(id).unwrap();
        assert_eq!(ledger.read(id).unwrap(), JobStatus::Pending);
    }

    #[test]
    fn stale_scan_skips_fresh_and_terminal_jobs() {
        let (_dir, ledger) = ledger();
        let fresh = Uuid::new_v4();
        let done = Uuid::new_v4();
        ledger
            .write(
                fresh,
                JobStatus::Processing {
                    stage: "separate".into(),
                    detail: "separating stems".into(),
                },
            )
            .unwrap();
        ledger.write(done, JobStatus::Complete).unwrap();
        assert!(ledger.stale_jobs(Duration::from_secs(60)).unwrap().is_empty());
        // with a zero threshold the in-flight job is stale, the terminal one never is
        let stale = ledger.stale_jobs(Duration::from_secs(0)).unwrap();
        assert_eq!(stale, vec![fresh]);
    }
}
