use std::fs;

use async_trait::async_trait;

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

/// Run the configured separator tool and collect the stem wavs it
/// produces. The tool is invoked as `<separator...> <input> <out_dir>`
/// and is expected to drop one wav per instrument into the directory.
pub struct SeparateStems;

const NAME: &str = "separate";

#[async_trait]
impl Stage for SeparateStems {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "separating the track into stems".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let mut cmd = ctx.tools.separator.iter();
        let program = cmd
            .next()
            .ok_or_else(|| StageError::new(NAME, "no separator tool configured"))?
            .clone();

        let stems_dir = ctx.work_dir.join("stems");
        fs::create_dir_all(&stems_dir)
            .map_err(|e| StageError::new(NAME, format!("creating stems dir: {e}")))?;

        let mut args: Vec<String> = cmd.cloned().collect();
        args.push(ctx.current.display().to_string());
        args.push(stems_dir.display().to_string());

        let run = ctx.runner.run(&program, args).await.map_err(|e| {
            StageError::new(
                NAME,
                format!("separator '{program}' could not be launched: {e}"),
            )
        })?;
        if !run.success {
            return Err(StageError::new(
                NAME,
                format!("separator failed: {}", run.stderr_tail()),
            ));
        }

        let produced = stem_files(ctx)?;
        if produced.is_empty() {
            return Err(StageError::new(
                NAME,
                "separator produced no stem files".to_string(),
            ));
        }
        tracing::debug!(job_id = %ctx.manifest.id, stems = produced.len(), "stems produced");

        ctx.hand_off(stems_dir);
        Ok(())
    }
}

fn stem_files(ctx: &StageContext) -> Result<Vec<std::path::PathBuf>, StageError> {
    let stems_dir = ctx.work_dir.join("stems");
    let mut files = Vec::new();
    let entries = fs::read_dir(&stems_dir)
        .map_err(|e| StageError::new(NAME, format!("reading stems dir: {e}")))?;
    for entry in entries {
        let path = entry
            .map_err(|e| StageError::new(NAME, e.to_string()))?
            .path();
        if path.extension().and_then(|e| e.to_str()) == Some("wav") {
            files.push(path);
        }
    }
    Ok(files)
}
