mod actor;
mod messages;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};

use self::actor::JobCoordinator;
use self::messages::CoordinatorMessage::{self, CancelJob, SubmitJob, Subscribe};
pub use self::messages::SubmitRequest;
use crate::audit::AuditSink;
use crate::config::Config;
use crate::errors;
use crate::events::JobEvent;
use crate::status::StatusLedger;
use crate::store::ArtifactStore;
use crate::types::JobId;

/// A `JobCoordinator` which accepts submissions, spawns one worker
/// process per job, enforces the concurrency cap, and reaps jobs whose
/// worker died without reporting.
///
/// This struct is actually an actor handle; the real work is done in the
/// actor spawned by `JobCoordinatorHandle::spawn`. The handle can be
/// cloned freely in a multi-thread async context without any extra
/// synchronization.
#[derive(Clone)]
pub struct JobCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl JobCoordinatorHandle {
    /// Spawn a new coordinator.
    ///
    /// `config_path` is forwarded to every worker process so that both
    /// sides resolve the same roots and tool paths. `message_capacity`
    /// limits the build-up of inbound messages.
    pub fn spawn(
        config: Config,
        config_path: PathBuf,
        ledger: StatusLedger,
        store: ArtifactStore,
        audit: Arc<dyn AuditSink>,
        message_capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(message_capacity);
        JobCoordinator::spawn(receiver, config, config_path, ledger, store, audit);
        Self { sender }
    }

    /// Submit a new job. Returns as soon as the upload is persisted and
    /// the worker is spawned (or queued); never waits on the pipeline.
    pub async fn submit(&self, request: SubmitRequest) -> errors::Result<JobId> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SubmitJob {
                request,
                response: tx,
            })
            .await
            .expect("JobCoordinator exited");
        rx.await.expect("JobCoordinator exited")
    }

    /// Cancel a queued or running job. The job lands in
    /// `Failed("job canceled")` once its worker is gone.
    pub async fn cancel(&self, job_id: JobId) -> errors::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CancelJob {
                job_id,
                response: tx,
            })
            .await
            .expect("JobCoordinator exited");
        rx.await.expect("JobCoordinator exited")
    }

    /// Subscribe to lifecycle events observed by this coordinator. The
    /// status ledger remains the durable source of truth.
    pub async fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Subscribe { response: tx })
            .await
            .expect("JobCoordinator exited");
        rx.await.expect("JobCoordinator exited")
    }
}
