use std::fs;

use async_trait::async_trait;

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

const DEFAULT_PROMPT: &str =
    "Analyze the lyrics, delivery, and mood of this vocal track as a whole.";

/// Send the vocals stem to the analysis service together with the
/// caller's prompt and persist the returned text.
pub struct AnalyzeVocals;

const NAME: &str = "analyze";

#[async_trait]
impl Stage for AnalyzeVocals {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "analyzing the vocal stem".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        if ctx.remote.analyze_url.is_empty() {
            return Err(StageError::new(NAME, "no analysis endpoint configured"));
        }

        // the previous stage hands off the stems directory
        let vocals = ctx.current.join("vocals.wav");
        if !vocals.exists() {
            return Err(StageError::new(
                NAME,
                "vocals stem was not produced by separation",
            ));
        }

        let prompt = ctx
            .manifest
            .params
            .prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        let audio = fs::read(&vocals)
            .map_err(|e| StageError::new(NAME, format!("reading vocals stem: {e}")))?;
        let part = reqwest::multipart::Part::bytes(audio).file_name("vocals.wav");
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("prompt", prompt);

        let client = reqwest::Client::new();
        let mut request = client.post(&ctx.remote.analyze_url).multipart(form);
        if let Ok(token) = std::env::var(&ctx.remote.api_key_env) {
            request = request.bearer_auth(token);
        }

        let analysis = request
            .send()
            .await
            .map_err(|e| StageError::new(NAME, format!("analysis request failed: {e}")))?
            .error_for_status()
            .map_err(|e| StageError::new(NAME, format!("analysis service error: {e}")))?
            .text()
            .await
            .map_err(|e| StageError::new(NAME, format!("reading analysis body: {e}")))?;

        if analysis.trim().is_empty() {
            return Err(StageError::new(NAME, "analysis service returned no text"));
        }

        let out = ctx.work_dir.join("analysis.txt");
        fs::write(&out, analysis)
            .map_err(|e| StageError::new(NAME, format!("writing analysis: {e}")))?;
        ctx.hand_off(out);
        Ok(())
    }
}
