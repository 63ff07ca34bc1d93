use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::messages::{CoordinatorMessage, SubmitRequest};
use crate::actors::worker::{JobExit, WorkerHandle};
use crate::audit::{AuditEvent, AuditSink};
use crate::cleanup;
use crate::config::Config;
use crate::errors::{self, JobError, ValidationError};
use crate::events::JobEvent;
use crate::status::{JobStatus, StatusLedger};
use crate::store::ArtifactStore;
use crate::types::{validate_path_component, JobId, JobManifest};

pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    config: Config,
    config_path: PathBuf,
    ledger: StatusLedger,
    store: ArtifactStore,
    audit: Arc<dyn AuditSink>,
    workers: HashMap<JobId, WorkerHandle>,
    queue: VecDeque<JobId>,
    exit_tx: mpsc::UnboundedSender<JobExit>,
    exit_rx: mpsc::UnboundedReceiver<JobExit>,
    events: broadcast::Sender<JobEvent>,
}

impl JobCoordinator {
    pub fn spawn(
        inbox: mpsc::Receiver<CoordinatorMessage>,
        config: Config,
        config_path: PathBuf,
        ledger: StatusLedger,
        store: ArtifactStore,
        audit: Arc<dyn AuditSink>,
    ) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let actor = Self {
            inbox,
            config,
            config_path,
            ledger,
            store,
            audit,
            workers: HashMap::new(),
            queue: VecDeque::new(),
            exit_tx,
            exit_rx,
            events,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        let mut reaper = tokio::time::interval(Duration::from_secs(
            self.config.jobs.reap_interval_secs.max(1),
        ));
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                maybe_msg = self.inbox.recv() => {
                    match maybe_msg {
                        Some(msg) => self.handle_message(msg),
                        // all handles dropped; stop coordinating
                        None => break,
                    }
                }
                Some(exit) = self.exit_rx.recv() => {
                    self.handle_exit(exit);
                }
                _ = reaper.tick() => {
                    self.reap_stale();
                }
            }
        }
    }

    fn handle_message(&mut self, msg: CoordinatorMessage) {
        use CoordinatorMessage::*;
        match msg {
            SubmitJob { request, response } => {
                let result = self.submit(request);
                let _ = response.send(result);
            }
            CancelJob { job_id, response } => {
                let result = self.cancel(job_id);
                let _ = response.send(result);
            }
            Subscribe { response } => {
                let _ = response.send(self.events.subscribe());
            }
        }
    }

    /// Validate, persist the upload, record `Pending`, then launch or
    /// queue the worker. Never waits on pipeline work.
    fn submit(&mut self, request: SubmitRequest) -> errors::Result<JobId> {
        if request.bytes.is_empty() {
            return Err(ValidationError::MissingUpload.into());
        }
        validate_path_component("owner", &request.owner)?;
        validate_path_component("source_filename", &request.source_filename)?;
        if let Some(prompt) = &request.params.prompt {
            if prompt.contains("..") || prompt.contains('\0') {
                return Err(ValidationError::UnsafePathComponent { field: "prompt" }.into());
            }
        }

        let id = Uuid::new_v4();
        self.store.create_job_dir(id)?;
        let manifest = match self.persist_submission(id, request) {
            Ok(manifest) => manifest,
            Err(e) => {
                // a job that failed to persist must not leave its
                // directory behind; nothing else will ever clean it
                if let Err(cleanup_err) = self.store.cleanup_intermediate(id) {
                    tracing::warn!(job_id = %id, error = %cleanup_err, "cleaning up failed submission");
                }
                return Err(e);
            }
        };
        self.audit.record(&AuditEvent::new(
            id,
            &manifest.owner,
            manifest.kind,
            &manifest.source_filename,
            "started",
        ));
        let _ = self.events.send(JobEvent::Submitted { id });

        if self.workers.len() < self.config.jobs.max_concurrent {
            self.launch(id);
        } else {
            tracing::info!(job_id = %id, queued = self.queue.len() + 1, "worker cap reached, queueing job");
            self.queue.push_back(id);
        }
        Ok(id)
    }

    /// Everything between directory creation and the job becoming
    /// launchable: persist the upload and manifest, record `Pending`.
    fn persist_submission(
        &self,
        id: JobId,
        request: SubmitRequest,
    ) -> errors::Result<JobManifest> {
        let input = self
            .store
            .save_input(id, &request.source_filename, &request.bytes)?;
        let manifest = JobManifest {
            id,
            owner: request.owner,
            source_filename: request.source_filename,
            kind: request.kind,
            params: request.params,
            input,
        };
        self.store.write_manifest(&manifest)?;
        self.ledger.write(id, JobStatus::Pending)?;
        Ok(manifest)
    }

    /// Spawn the worker binary for `id`. Only the job id and the config
    /// path cross the process boundary; everything else the worker reads
    /// from the job manifest on disk.
    fn launch(&mut self, id: JobId) {
        let args = vec![
            OsString::from("--config"),
            self.config_path.clone().into_os_string(),
            OsString::from("--job-id"),
            OsString::from(id.to_string()),
        ];
        match WorkerHandle::spawn(id, &self.config.jobs.worker_bin, args, self.exit_tx.clone()) {
            Ok(handle) => {
                tracing::info!(job_id = %id, running = self.workers.len() + 1, "worker spawned");
                self.workers.insert(id, handle);
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "failed to launch worker");
                self.fail_job(id, format!("failed to launch worker: {e}"));
            }
        }
    }

    fn cancel(&mut self, id: JobId) -> errors::Result<()> {
        if let Some(pos) = self.queue.iter().position(|queued| *queued == id) {
            self.queue.remove(pos);
            self.fail_job(id, "job canceled".to_string());
            return Ok(());
        }
        match self.workers.get_mut(&id) {
            Some(worker) => {
                worker.stop();
                Ok(())
            }
            None => Err(JobError::NotFound),
        }
    }

    /// A worker process has exited. If it reported its own terminal
    /// state the job is done; otherwise the exit itself is the failure.
    fn handle_exit(&mut self, exit: JobExit) {
        self.workers.remove(&exit.job_id);
        match self.ledger.read(exit.job_id) {
            Ok(status) if status.is_terminal() => {
                let _ = self.events.send(JobEvent::Finished {
                    id: exit.job_id,
                    status,
                });
            }
            Ok(_) => {
                let detail = if exit.canceled {
                    "job canceled"
                } else {
                    "worker lost"
                };
                tracing::warn!(job_id = %exit.job_id, detail, "worker exited without reporting");
                self.fail_job(exit.job_id, detail.to_string());
            }
            Err(e) => {
                tracing::error!(job_id = %exit.job_id, error = %e, "reading ledger after worker exit");
            }
        }
        self.admit_queued();
    }

    fn admit_queued(&mut self) {
        while self.workers.len() < self.config.jobs.max_concurrent {
            match self.queue.pop_front() {
                Some(next) => self.launch(next),
                None => break,
            }
        }
    }

    /// Mark a job failed on the worker's behalf and release its
    /// intermediate artifacts. The ledger drops the write if the worker
    /// already reported a terminal state, so this can never regress a
    /// finished job.
    fn fail_job(&mut self, id: JobId, detail: String) {
        let manifest = self.store.read_manifest(id).ok();
        if let Err(e) = self.ledger.write(
            id,
            JobStatus::Failed {
                detail: detail.clone(),
            },
        ) {
            tracing::error!(job_id = %id, error = %e, "recording failure");
        }
        if let Some(manifest) = manifest {
            self.audit.record(&AuditEvent::new(
                id,
                &manifest.owner,
                manifest.kind,
                &manifest.source_filename,
                format!("failed: {detail}"),
            ));
        }
        if let Err(e) = cleanup::cleanup_intermediate(&self.store, id) {
            tracing::warn!(job_id = %id, error = %e, "cleaning up after failure");
        }
        let _ = self.events.send(JobEvent::Finished {
            id,
            status: JobStatus::Failed { detail },
        });
    }

    /// Fail jobs whose heartbeat went stale while no live worker is
    /// attached to them, i.e. orphans from a previous server run or
    /// workers killed from outside.
    fn reap_stale(&mut self) {
        let stale = match self
            .ledger
            .stale_jobs(Duration::from_secs(self.config.jobs.stale_after_secs))
        {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!(error = %e, "scanning ledger for stale jobs");
                return;
            }
        };
        for id in stale {
            if self.workers.contains_key(&id) || self.queue.contains(&id) {
                continue;
            }
            tracing::warn!(job_id = %id, "reaping job with a stale heartbeat");
            self.fail_job(id, "worker lost".to_string());
        }
    }
}
