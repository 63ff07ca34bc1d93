//! Handle over one spawned worker process.
//!
//! Jobs run in separate OS processes, not threads: a crashing or
//! resource-hungry stage can only take down its own job, heavy stage
//! state starts from a clean slate every time, and concurrency is
//! bounded by the host, not the runtime.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::types::JobId;

/// Sent to the coordinator once the worker process is gone, however it
/// went.
#[derive(Debug)]
pub struct JobExit {
    pub job_id: JobId,
    /// The exit was provoked by [`WorkerHandle::stop`].
    pub canceled: bool,
}

pub struct WorkerHandle {
    kill_tx: Option<oneshot::Sender<()>>,
}

impl WorkerHandle {
    /// Spawn the worker process and a monitor task that reaps it and
    /// notifies `exit_tx` when it is gone.
    pub fn spawn(
        job_id: JobId,
        program: &Path,
        args: Vec<OsString>,
        exit_tx: mpsc::UnboundedSender<JobExit>,
    ) -> io::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut canceled = false;
            tokio::select! {
                result = &mut kill_rx => {
                    // Ok(()) is an explicit stop; Err means the handle was
                    // dropped, which also tears the child down.
                    canceled = result.is_ok();
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
                status = child.wait() => {
                    match status {
                        Ok(status) => {
                            tracing::debug!(job_id = %job_id, %status, "worker process exited")
                        }
                        Err(e) => {
                            tracing::warn!(job_id = %job_id, error = %e, "waiting on worker process")
                        }
                    }
                }
            }
            let _ = exit_tx.send(JobExit { job_id, canceled });
        });

        Ok(Self {
            kill_tx: Some(kill_tx),
        })
    }

    /// Kill the worker process. Idempotent; the terminal status write is
    /// handled by the coordinator once the exit is observed.
    pub fn stop(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}
