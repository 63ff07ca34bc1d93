use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use reqwest::multipart;
use uuid::Uuid;

pub struct Client {
    base: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(server: &str) -> Self {
        Self {
            base: server.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn submit(
        &self,
        file: &Path,
        kind: &str,
        owner: &str,
        prompt: Option<&str>,
    ) -> anyhow::Result<Uuid> {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let filename = file
            .file_name()
            .context("file path has no filename")?
            .to_string_lossy()
            .into_owned();

        let mut form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(filename))
            .text("kind", kind.to_string())
            .text("owner", owner.to_string());
        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let resp = self
            .http
            .post(format!("{}/api/jobs", self.base))
            .multipart(form)
            .send()
            .await?;
        let body = Self::json(resp).await?;
        let job_id = body["job_id"]
            .as_str()
            .context("server response is missing job_id")?
            .parse()?;
        Ok(job_id)
    }

    pub async fn status(&self, job_id: Uuid) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .http
            .get(format!("{}/api/jobs/{job_id}/status", self.base))
            .send()
            .await?;
        Self::json(resp).await
    }

    /// Download the result. The server forgets the job on delivery, so
    /// the returned path holds the only remaining copy.
    pub async fn fetch(&self, job_id: Uuid, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
        let resp = self
            .http
            .get(format!("{}/api/jobs/{job_id}/result", self.base))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("server returned {status}: {body}");
        }

        let path = output.unwrap_or_else(|| {
            filename_from_disposition(
                resp.headers()
                    .get("content-disposition")
                    .and_then(|v| v.to_str().ok()),
            )
            .unwrap_or_else(|| PathBuf::from(format!("{job_id}.bin")))
        });
        let bytes = resp.bytes().await?;
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub async fn cancel(&self, job_id: Uuid) -> anyhow::Result<()> {
        let resp = self
            .http
            .delete(format!("{}/api/jobs/{job_id}", self.base))
            .send()
            .await?;
        Self::json(resp).await?;
        Ok(())
    }

    async fn json(resp: reqwest::Response) -> anyhow::Result<serde_json::Value> {
        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("server returned {status} with a non-JSON body"))?;
        if !status.is_success() {
            bail!(
                "server returned {status}: {}",
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(body)
    }
}

fn filename_from_disposition(header: Option<&str>) -> Option<PathBuf> {
    let header = header?;
    let name = header.split("filename=").nth(1)?.trim_matches('"');
    // never let a server-supplied name escape the working directory
    let name = Path::new(name).file_name()?;
    Some(PathBuf::from(name))
}
