use bytes::Bytes;
use tokio::sync::{broadcast, oneshot};

use crate::errors;
use crate::events::JobEvent;
use crate::types::{JobId, JobKind, JobParams};

/// One submission as handed over by the facade: the raw upload plus the
/// attribution fields. Validation happens inside the actor, before any
/// filesystem activity.
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    pub bytes: Bytes,
    pub owner: String,
    pub source_filename: String,
    pub kind: JobKind,
    pub params: JobParams,
}

pub enum CoordinatorMessage {
    SubmitJob {
        request: SubmitRequest,
        response: oneshot::Sender<errors::Result<JobId>>,
    },
    CancelJob {
        job_id: JobId,
        response: oneshot::Sender<errors::Result<()>>,
    },
    Subscribe {
        response: oneshot::Sender<broadcast::Receiver<JobEvent>>,
    },
}
