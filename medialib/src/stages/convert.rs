use async_trait::async_trait;

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

/// Drop the video track and re-encode the audio as mp3.
pub struct TranscodeToMp3;

const NAME: &str = "transcode";

#[async_trait]
impl Stage for TranscodeToMp3 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "transcoding audio track to mp3".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let output = ctx.work_dir.join("audio.mp3");
        let args = [
            "-y".to_string(),
            "-i".to_string(),
            ctx.current.display().to_string(),
            "-vn".to_string(),
            "-q:a".to_string(),
            "0".to_string(),
            output.display().to_string(),
        ];
        let run = ctx
            .runner
            .run(&ctx.tools.ffmpeg, args)
            .await
            .map_err(|e| StageError::new(NAME, format!("ffmpeg could not be launched: {e}")))?;
        if !run.success {
            return Err(StageError::new(
                NAME,
                format!("ffmpeg failed: {}", run.stderr_tail()),
            ));
        }
        ctx.expect_artifact(NAME, &output)?;
        ctx.hand_off(output);
        Ok(())
    }
}
