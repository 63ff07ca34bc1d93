use async_trait::async_trait;

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

/// Burn the generated captions into the original video with the
/// configured font, keeping the audio untouched.
pub struct BurnSubtitles;

const NAME: &str = "mux";

#[async_trait]
impl Stage for BurnSubtitles {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "burning subtitles into the video".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        if !ctx.tools.font_file.exists() {
            return Err(StageError::new(
                NAME,
                format!("font file not found: {}", ctx.tools.font_file.display()),
            ));
        }

        // `current` is the srt from the captions stage; the video is the
        // original upload.
        let srt = ctx.current.clone();
        let video = ctx.manifest.input.clone();
        let output = ctx.work_dir.join("subtitled.mp4");

        let filter = format!(
            "subtitles='{}':force_style='FontFile={}'",
            srt.display(),
            ctx.tools.font_file.display()
        );
        let args = [
            "-y".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-vf".to_string(),
            filter,
            "-c:a".to_string(),
            "copy".to_string(),
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
                format!("subtitle burn-in failed: {}", run.stderr_tail()),
            ));
        }
        ctx.expect_artifact(NAME, &output)?;
        ctx.hand_off(output);
        Ok(())
    }
}
