use crate::status::JobStatus;
use crate::types::JobId;

/// Low-latency notifications for observers living in the server process.
///
/// The file ledger stays the source of truth; these events merely save a
/// local subscriber from polling it. Cross-process observers still poll.
#[derive(Clone, Debug)]
pub enum JobEvent {
    Submitted { id: JobId },
    Finished { id: JobId, status: JobStatus },
}
