use std::fs;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

/// One timestamped line of the transcript, as returned by the remote
/// transcription service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cue {
    /// `HH:MM:SS.mmm`
    pub start: String,
    /// `HH:MM:SS.mmm`
    pub end: String,
    pub text: String,
}

/// Send the extracted audio to the transcription service and persist the
/// timestamped transcript as `transcript.json`.
pub struct Transcribe;

const NAME: &str = "transcribe";

#[async_trait]
impl Stage for Transcribe {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "requesting a timestamped transcription".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        if ctx.remote.transcribe_url.is_empty() {
            return Err(StageError::new(NAME, "no transcription endpoint configured"));
        }

        let audio = fs::read(&ctx.current)
            .map_err(|e| StageError::new(NAME, format!("reading audio: {e}")))?;
        let file_name = ctx
            .current
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(audio).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let client = reqwest::Client::new();
        let mut request = client.post(&ctx.remote.transcribe_url).multipart(form);
        if let Ok(token) = std::env::var(&ctx.remote.api_key_env) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StageError::new(NAME, format!("transcription request failed: {e}")))?
            .error_for_status()
            .map_err(|e| StageError::new(NAME, format!("transcription service error: {e}")))?;
        let body = response
            .text()
            .await
            .map_err(|e| StageError::new(NAME, format!("reading transcription body: {e}")))?;

        let cues = parse_transcript(&body)?;
        if cues.is_empty() {
            return Err(StageError::new(NAME, "transcription returned no cues"));
        }

        let transcript = ctx.work_dir.join("transcript.json");
        let bytes = serde_json::to_vec_pretty(&cues)
            .map_err(|e| StageError::new(NAME, e.to_string()))?;
        fs::write(&transcript, bytes)
            .map_err(|e| StageError::new(NAME, format!("writing transcript: {e}")))?;
        ctx.hand_off(transcript);
        Ok(())
    }
}

/// Parse the service response into cues, tolerating a transcript wrapped
/// in markdown code fences.
pub fn parse_transcript(body: &str) -> Result<Vec<Cue>, StageError> {
    let cleaned = body
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned)
        .map_err(|e| StageError::new(NAME, format!("malformed transcription response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_responses() {
        let raw = r#"[{"start": "00:00:02.123", "end": "00:00:05.456", "text": "first line"}]"#;
        let cues = parse_transcript(raw).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "first line");

        let fenced = format!("```json\n{raw}\n```");
        let cues = parse_transcript(&fenced).unwrap();
        assert_eq!(cues[0].start, "00:00:02.123");
    }

    #[test]
    fn garbage_is_a_stage_failure() {
        let err = parse_transcript("the model replied with prose").unwrap_err();
        assert_eq!(err.stage, "transcribe");
        assert!(err.cause.contains("malformed"));
    }
}
