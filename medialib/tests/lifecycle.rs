//! End-to-end coordinator behavior against fake worker binaries.
//!
//! Real workers are separate OS processes, so these tests stand in small
//! shell scripts for the worker binary and observe the outcome through
//! the status ledger, exactly like an external poller would.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use medialib::audit::NullAuditSink;
use medialib::config::Config;
use medialib::status::{JobStatus, StatusLedger};
use medialib::store::ArtifactStore;
use medialib::types::{JobKind, JobParams};
use medialib::{JobCoordinator, JobEvent, SubmitRequest};

struct Harness {
    dir: tempfile::TempDir,
    coordinator: JobCoordinator,
    ledger: StatusLedger,
    store: ArtifactStore,
}

fn fake_worker(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-worker.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn harness(worker_body: &str, max_concurrent: usize) -> Harness {
    harness_with(worker_body, |config| config.jobs.max_concurrent = max_concurrent)
}

fn harness_with(worker_body: &str, configure: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.processing_root = dir.path().join("processing");
    config.storage.results_root = dir.path().join("results");
    config.storage.status_root = dir.path().join("status");
    config.storage.audit_log = dir.path().join("audit.jsonl");
    config.jobs.worker_bin = fake_worker(dir.path(), worker_body);
    configure(&mut config);

    let ledger = StatusLedger::open(&config.storage.status_root).unwrap();
    let store = ArtifactStore::open(
        &config.storage.processing_root,
        &config.storage.results_root,
    )
    .unwrap();
    let coordinator = JobCoordinator::spawn(
        config,
        dir.path().join("config.toml"),
        ledger.clone(),
        store.clone(),
        Arc::new(NullAuditSink),
        32,
    );
    Harness {
        dir,
        coordinator,
        ledger,
        store,
    }
}

fn request() -> SubmitRequest {
    SubmitRequest {
        bytes: bytes::Bytes::from_static(b"fake media bytes"),
        owner: "tester".into(),
        source_filename: "clip.mp4".into(),
        kind: JobKind::Convert,
        params: JobParams::default(),
    }
}

async fn wait_for_terminal(ledger: &StatusLedger, id: medialib::types::JobId) -> JobStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = ledger.read(id).unwrap();
        if status.is_terminal() {
            return status;
        }
        assert!(Instant::now() < deadline, "job {id} never reached a terminal state");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn submission_returns_before_the_pipeline_finishes() {
    let h = harness("sleep 5", 4);
    let started = Instant::now();
    let id = h.coordinator.submit(request()).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "submit must not wait on the worker"
    );
    // the fake worker has not written anything yet
    assert_eq!(h.ledger.read(id).unwrap(), JobStatus::Pending);
    // the job got its own artifact root with the persisted upload
    assert!(h.store.job_dir(id).join("input.mp4").exists());
}

#[tokio::test]
async fn invalid_submissions_never_reach_the_filesystem() {
    let h = harness("sleep 1", 4);

    let mut empty = request();
    empty.bytes = bytes::Bytes::new();
    assert!(h.coordinator.submit(empty).await.is_err());

    let mut traversal = request();
    traversal.owner = "../../etc".into();
    assert!(h.coordinator.submit(traversal).await.is_err());

    let mut separator = request();
    separator.source_filename = "a/b.mp4".into();
    assert!(h.coordinator.submit(separator).await.is_err());
}

#[tokio::test]
async fn failed_submission_leaves_no_artifacts() {
    let h = harness("sleep 1", 4);
    // deleting the ledger directory makes the Pending write fail after
    // the job directory and upload already exist
    std::fs::remove_dir_all(h.dir.path().join("status")).unwrap();
    assert!(h.coordinator.submit(request()).await.is_err());

    let leftovers: Vec<_> = std::fs::read_dir(h.dir.path().join("processing"))
        .unwrap()
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn stale_orphan_records_are_reaped() {
    let h = harness_with("sleep 1", |config| {
        config.jobs.reap_interval_secs = 1;
        config.jobs.stale_after_secs = 0;
    });
    // a job left behind by a previous server run: a working directory
    // and a non-terminal record, but no live worker
    let id = uuid::Uuid::new_v4();
    h.store.create_job_dir(id).unwrap();
    std::fs::write(h.store.job_dir(id).join("input.mp4"), b"orphan").unwrap();
    h.ledger
        .write(
            id,
            JobStatus::Processing {
                stage: "separate".into(),
                detail: "separating the track into stems".into(),
            },
        )
        .unwrap();

    let status = wait_for_terminal(&h.ledger, id).await;
    assert_eq!(
        status,
        JobStatus::Failed {
            detail: "worker lost".into()
        }
    );
    assert!(!h.store.job_dir(id).exists());
}

#[tokio::test]
async fn worker_exit_without_report_is_a_lost_worker() {
    let h = harness("exit 0", 4);
    let id = h.coordinator.submit(request()).await.unwrap();
    let status = wait_for_terminal(&h.ledger, id).await;
    assert_eq!(
        status,
        JobStatus::Failed {
            detail: "worker lost".into()
        }
    );
    // failure path released the intermediates
    assert!(!h.store.job_dir(id).exists());
}

#[tokio::test]
async fn cancellation_kills_the_worker() {
    let h = harness("sleep 30", 4);
    let id = h.coordinator.submit(request()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.coordinator.cancel(id).await.unwrap();
    let status = wait_for_terminal(&h.ledger, id).await;
    assert_eq!(
        status,
        JobStatus::Failed {
            detail: "job canceled".into()
        }
    );
}

#[tokio::test]
async fn cancelling_an_unknown_job_is_an_error() {
    let h = harness("sleep 1", 4);
    assert!(h.coordinator.cancel(uuid::Uuid::new_v4()).await.is_err());
}

#[tokio::test]
async fn concurrent_submissions_get_distinct_roots_and_outcomes() {
    let h = harness("exit 0", 8);
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(h.coordinator.submit(request()).await.unwrap());
    }
    let mut roots: Vec<_> = ids.iter().map(|id| h.store.job_dir(*id)).collect();
    roots.sort();
    roots.dedup();
    assert_eq!(roots.len(), 5);
    for id in ids {
        let status = wait_for_terminal(&h.ledger, id).await;
        assert!(matches!(status, JobStatus::Failed { .. }));
    }
}

#[tokio::test]
async fn submissions_beyond_the_cap_queue_and_drain() {
    let h = harness("sleep 0.2", 1);
    let first = h.coordinator.submit(request()).await.unwrap();
    let second = h.coordinator.submit(request()).await.unwrap();
    let third = h.coordinator.submit(request()).await.unwrap();
    // every queued job eventually runs and reaches a terminal state
    for id in [first, second, third] {
        let status = wait_for_terminal(&h.ledger, id).await;
        assert!(status.is_terminal(), "{status:?}");
    }
}

#[tokio::test]
async fn events_mirror_the_ledger() {
    let h = harness("exit 0", 4);
    let mut events = h.coordinator.subscribe().await;
    let id = h.coordinator.submit(request()).await.unwrap();

    let submitted = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(submitted, JobEvent::Submitted { id: got } if got == id));

    let finished = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match finished {
        JobEvent::Finished { id: got, status } => {
            assert_eq!(got, id);
            assert!(status.is_terminal());
        }
        other => panic!("unexpected event {other:?}"),
    }
}
