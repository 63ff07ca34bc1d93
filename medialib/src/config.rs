//! TOML configuration shared by the server and the worker binary.
//!
//! Both processes load the same file, which is how they agree on the
//! artifact roots, the ledger location, and the external tool paths
//! without any richer IPC.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub jobs: JobSettings,
    #[serde(default)]
    pub tools: ToolSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageSettings {
    /// Per-job working directories live here, one subtree per job id.
    #[serde(default = "default_processing_root")]
    pub processing_root: PathBuf,
    /// Published results, one file per completed job.
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,
    /// Status ledger records. Kept outside the processing root so that
    /// intermediate cleanup never erases a job's status.
    #[serde(default = "default_status_root")]
    pub status_root: PathBuf,
    /// JSON-lines audit log of lifecycle events.
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            processing_root: default_processing_root(),
            results_root: default_results_root(),
            status_root: default_status_root(),
            audit_log: default_audit_log(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct JobSettings {
    /// Path of the worker binary spawned once per job.
    #[serde(default = "default_worker_bin")]
    pub worker_bin: PathBuf,
    /// Cap on simultaneously running workers; submissions beyond the cap
    /// queue in FIFO order and stay `Pending` until a slot frees up.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// A non-terminal job whose heartbeat is older than this is declared
    /// lost by the reaper.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            worker_bin: default_worker_bin(),
            max_concurrent: default_max_concurrent(),
            stale_after_secs: default_stale_after_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    /// Command prefix for the stem separator, e.g. `["demucs", "--two-stems=vocals"]`.
    /// The input file and output directory are appended.
    #[serde(default = "default_separator")]
    pub separator: Vec<String>,
    /// Font burned into subtitled video.
    #[serde(default = "default_font_file")]
    pub font_file: PathBuf,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            separator: default_separator(),
            font_file: default_font_file(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemoteSettings {
    /// Timestamped-transcription service endpoint.
    #[serde(default)]
    pub transcribe_url: String,
    /// Vocal-analysis service endpoint.
    #[serde(default)]
    pub analyze_url: String,
    /// Name of the environment variable holding the bearer token for the
    /// remote services. The token itself never appears in config files.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            transcribe_url: String::new(),
            analyze_url: String::new(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_processing_root() -> PathBuf {
    PathBuf::from("./data/processing")
}

fn default_results_root() -> PathBuf {
    PathBuf::from("./data/results")
}

fn default_status_root() -> PathBuf {
    PathBuf::from("./data/status")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("./data/audit.jsonl")
}

fn default_worker_bin() -> PathBuf {
    PathBuf::from("worker")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_stale_after_secs() -> u64 {
    1800
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_separator() -> Vec<String> {
    vec!["demucs".to_string()]
}

fn default_font_file() -> PathBuf {
    PathBuf::from("./fonts/NotoSansJP-Regular.ttf")
}

fn default_api_key_env() -> String {
    "MEDIA_API_KEY".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.jobs.max_concurrent, 4);
        assert_eq!(cfg.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [jobs]
            max_concurrent = 1

            [remote]
            transcribe_url = "http://localhost:9000/transcribe"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.jobs.max_concurrent, 1);
        assert_eq!(cfg.jobs.stale_after_secs, 1800);
        assert_eq!(cfg.remote.transcribe_url, "http://localhost:9000/transcribe");
        assert_eq!(cfg.remote.api_key_env, "MEDIA_API_KEY");
    }
}
