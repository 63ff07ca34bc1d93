//! Per-job worker process.
//!
//! The server spawns exactly one of these per accepted job. All pipeline
//! outcomes are reported through the status ledger; the process exits 0
//! whether the job completed or failed, because a contained stage failure
//! is a normal outcome. A non-zero exit means the worker itself broke
//! before it could report, which the server treats as a lost worker.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use medialib::audit::{AuditEvent, AuditSink, JsonlAuditSink};
use medialib::config::Config;
use medialib::stage::{run_pipeline, StageContext};
use medialib::stages::pipeline_for;
use medialib::status::{JobStatus, StatusLedger};
use medialib::store::ArtifactStore;
use medialib::types::JobId;

#[derive(Parser)]
#[command(about = "Runs a single media job to completion and exits")]
struct Args {
    /// Configuration file shared with the server.
    #[arg(long)]
    config: PathBuf,

    /// Id of the job to run; its manifest and input must already exist.
    #[arg(long)]
    job_id: Uuid,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // could not even report through the ledger; the server's
            // exit monitor turns this into `Failed("worker lost")`
            tracing::error!(error = %e, "worker aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let ledger = StatusLedger::open(&config.storage.status_root)?;
    let store = ArtifactStore::open(
        &config.storage.processing_root,
        &config.storage.results_root,
    )?;
    let audit: Arc<dyn AuditSink> = Arc::new(JsonlAuditSink::new(&config.storage.audit_log));

    let manifest = store
        .read_manifest(args.job_id)
        .with_context(|| format!("reading manifest for job {}", args.job_id))?;
    tracing::info!(job_id = %manifest.id, kind = manifest.kind.as_str(), "worker starting");

    // keep the heartbeat fresh while a single stage runs longer than
    // the reaper's staleness threshold
    let heartbeat = {
        let ledger = ledger.clone();
        let id = manifest.id;
        let period = Duration::from_secs((config.jobs.stale_after_secs / 3).max(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(e) = ledger.touch(id) {
                    tracing::warn!(job_id = %id, error = %e, "heartbeat refresh failed");
                }
            }
        })
    };

    let stages = pipeline_for(manifest.kind);
    let mut ctx = StageContext::new(
        manifest.clone(),
        store.job_dir(manifest.id),
        config.tools.clone(),
        config.remote.clone(),
    );

    let outcome = run_pipeline(&stages, &mut ctx, &ledger).await;
    heartbeat.abort();

    match outcome {
        Ok(()) => {
            let published = store.publish_result(manifest.id, manifest.kind, &ctx.current)?;
            ledger.write(manifest.id, JobStatus::Complete)?;
            audit.record(&AuditEvent::new(
                manifest.id,
                &manifest.owner,
                manifest.kind,
                &manifest.source_filename,
                "completed",
            ));
            tracing::info!(job_id = %manifest.id, result = %published.display(), "job complete");
        }
        Err(stage_err) => {
            let detail = stage_err.to_string();
            ledger.write(manifest.id, JobStatus::Failed {
                detail: detail.clone(),
            })?;
            audit.record(&AuditEvent::new(
                manifest.id,
                &manifest.owner,
                manifest.kind,
                &manifest.source_filename,
                format!("failed: {detail}"),
            ));
            tracing::warn!(job_id = %manifest.id, detail, "job failed");
        }
    }

    // success or failure, the working tree is no longer needed
    cleanup(&store, manifest.id);
    Ok(())
}

fn cleanup(store: &ArtifactStore, id: JobId) {
    if let Err(e) = store.cleanup_intermediate(id) {
        tracing::warn!(job_id = %id, error = %e, "intermediate cleanup failed");
    }
}
