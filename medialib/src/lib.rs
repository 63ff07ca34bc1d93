//! Asynchronous orchestration of long-running media processing jobs.
//!
//! A submitted upload gets a job id, a private artifact directory, and a
//! dedicated worker process that drives its stage pipeline. Progress is
//! observable only through the durable per-job status ledger; artifacts
//! are released on every terminal path.

mod actors;
pub mod audit;
pub mod cleanup;
pub mod config;
pub mod errors;
mod events;
pub mod runner;
pub mod stage;
pub mod stages;
pub mod status;
pub mod store;
pub mod types;

// re-export the coordinator handle as if it is the coordinator itself.
pub use actors::coordinator::{JobCoordinatorHandle as JobCoordinator, SubmitRequest};
pub use events::JobEvent;
