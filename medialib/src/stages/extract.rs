use async_trait::async_trait;

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

/// Pull the audio out of the upload as 16 kHz mono PCM, the format the
/// transcription service expects.
pub struct ExtractAudio;

const NAME: &str = "extract_audio";

#[async_trait]
impl Stage for ExtractAudio {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "extracting audio from the video".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let output = ctx.work_dir.join("extracted_audio.wav");
        let args = [
            "-y".to_string(),
            "-i".to_string(),
            ctx.current.display().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-ac".to_string(),
            "1".to_string(),
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
                format!("audio extraction failed: {}", run.stderr_tail()),
            ));
        }
        ctx.expect_artifact(NAME, &output)?;
        ctx.hand_off(output);
        Ok(())
    }
}
