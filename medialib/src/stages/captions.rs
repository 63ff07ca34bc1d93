use std::fs;

use async_trait::async_trait;

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};
use crate::stages::transcribe::Cue;

/// Turn the timestamped transcript into an SRT caption file.
pub struct GenerateCaptions;

const NAME: &str = "captions";

#[async_trait]
impl Stage for GenerateCaptions {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "generating the subtitle file".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let raw = fs::read_to_string(&ctx.current)
            .map_err(|e| StageError::new(NAME, format!("reading transcript: {e}")))?;
        let cues: Vec<Cue> = serde_json::from_str(&raw)
            .map_err(|e| StageError::new(NAME, format!("malformed transcript: {e}")))?;
        if cues.is_empty() {
            return Err(StageError::new(NAME, "transcript contains no cues"));
        }

        let srt_path = ctx.work_dir.join("subtitle.srt");
        fs::write(&srt_path, render_srt(&cues))
            .map_err(|e| StageError::new(NAME, format!("writing subtitle file: {e}")))?;
        ctx.hand_off(srt_path);
        Ok(())
    }
}

/// SRT cue timestamps use a comma as the millisecond separator.
pub fn render_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        let start = cue.start.replace('.', ",");
        let end = cue.end.replace('.', ",");
        out.push_str(&format!("{}\n{start} --> {end}\n{}\n\n", i + 1, cue.text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(start: &str, end: &str, text: &str) -> Cue {
        Cue {
            start: start.into(),
            end: end.into(),
            text: text.into(),
        }
    }

    #[test]
    fn renders_numbered_cues_with_comma_timestamps() {
        let srt = render_srt(&[
            cue("00:00:02.123", "00:00:05.456", "first line"),
            cue("00:00:06.789", "00:00:09.999", "second line"),
        ]);
        let expected = "1\n00:00:02,123 --> 00:00:05,456\nfirst line\n\n\
                        2\n00:00:06,789 --> 00:00:09,999\nsecond line\n\n";
        assert_eq!(srt, expected);
    }
}
