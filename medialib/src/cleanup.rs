//! Terminal-state cleanup.
//!
//! Both operations run on every exit path of a job and must be safe to
//! call any number of times: a second invocation on an already-cleaned
//! job is a no-op, never an error.

use std::io;

use crate::status::StatusLedger;
use crate::store::ArtifactStore;
use crate::types::JobId;

/// Drop the input and intermediates once a job reaches a terminal state.
/// The result (if any) and the status record stay so the caller can
/// still poll and download.
pub fn cleanup_intermediate(store: &ArtifactStore, id: JobId) -> io::Result<()> {
    store.cleanup_intermediate(id)
}

/// Forget the job entirely: intermediates, published result, and status
/// record. Runs after the result has been delivered once.
pub fn cleanup_all(store: &ArtifactStore, ledger: &StatusLedger, id: JobId) -> io::Result<()> {
    store.cleanup_all(id)?;
    ledger.remove(id)
}
