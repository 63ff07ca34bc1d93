//! The stage contract and the pipeline runner.
//!
//! A stage is an opaque transformation: it consumes the artifact handed
//! to it, produces a new one, or fails with a cause naming itself. The
//! runner only sequences stages and records status transitions; it has
//! no stage-specific knowledge.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::{RemoteSettings, ToolSettings};
use crate::errors::StageError;
use crate::runner::CommandRunner;
use crate::status::{JobStatus, StatusLedger};
use crate::types::JobManifest;

#[async_trait]
pub trait Stage: Send + Sync {
    /// Short identifier surfaced in status records and failure details.
    fn name(&self) -> &'static str;

    /// Human-readable progress line shown to pollers while this stage
    /// runs.
    fn detail(&self) -> String {
        format!("running {}", self.name())
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError>;
}

/// Mutable state threaded through the pipeline. `current` is the output
/// of the previous stage and the input of the next one.
pub struct StageContext {
    pub manifest: JobManifest,
    pub work_dir: PathBuf,
    pub current: PathBuf,
    pub tools: ToolSettings,
    pub remote: RemoteSettings,
    pub runner: CommandRunner,
}

impl StageContext {
    pub fn new(
        manifest: JobManifest,
        work_dir: PathBuf,
        tools: ToolSettings,
        remote: RemoteSettings,
    ) -> Self {
        let current = manifest.input.clone();
        Self {
            manifest,
            work_dir,
            current,
            tools,
            remote,
            runner: CommandRunner,
        }
    }

    /// Hand an artifact to the next stage.
    pub fn hand_off(&mut self, artifact: PathBuf) {
        self.current = artifact;
    }

    /// Fail loudly when a stage's expected output never appeared. A
    /// silent empty result must not be allowed to reach `Complete`.
    pub fn expect_artifact(&self, stage: &'static str, path: &Path) -> Result<(), StageError> {
        if path.exists() {
            Ok(())
        } else {
            Err(StageError::new(
                stage,
                format!("expected output missing: {}", path.display()),
            ))
        }
    }
}

/// Drive the stages in order, writing `Processing(stage)` to the ledger
/// immediately before each one runs. A poller observing a stage's status
/// can therefore never see artifacts of a later stage.
pub async fn run_pipeline(
    stages: &[Box<dyn Stage>],
    ctx: &mut StageContext,
    ledger: &StatusLedger,
) -> Result<(), StageError> {
    for stage in stages {
        ledger
            .write(
                ctx.manifest.id,
                JobStatus::Processing {
                    stage: stage.name().to_string(),
                    detail: stage.detail(),
                },
            )
            .map_err(|e| {
                StageError::new(stage.name(), format!("failed to record status: {e}"))
            })?;
        tracing::info!(job_id = %ctx.manifest.id, stage = stage.name(), "stage starting");
        stage.run(ctx).await?;
        ctx.expect_artifact(stage.name(), &ctx.current)?;
        tracing::info!(job_id = %ctx.manifest.id, stage = stage.name(), "stage finished");
    }
    Ok(())
}
