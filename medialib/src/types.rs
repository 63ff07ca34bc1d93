use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;

pub type JobId = Uuid;

/// Which pipeline a job runs through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Transcode the upload's audio track to mp3.
    Convert,
    /// Separate the upload into instrument stems and bundle them.
    Separate,
    /// Separate, then send the vocals stem to the analysis service.
    Analyze,
    /// Transcribe the audio and burn subtitles into the video.
    Subtitle,
}

impl JobKind {
    pub fn result_extension(&self) -> &'static str {
        match self {
            JobKind::Convert => "mp3",
            JobKind::Separate => "zip",
            JobKind::Analyze => "txt",
            JobKind::Subtitle => "mp4",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Convert => "convert",
            JobKind::Separate => "separate",
            JobKind::Analyze => "analyze",
            JobKind::Subtitle => "subtitle",
        }
    }
}

impl FromStr for JobKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "convert" => Ok(JobKind::Convert),
            "separate" => Ok(JobKind::Separate),
            "analyze" => Ok(JobKind::Analyze),
            "subtitle" => Ok(JobKind::Subtitle),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// Caller-supplied knobs, passed through to the stages untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobParams {
    /// Free-form instruction for the analysis service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Everything the worker process needs to know about one job.
///
/// Written as `job.json` into the artifact root at submission time; the
/// only data crossing the server/worker process boundary besides the job
/// id itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobManifest {
    pub id: JobId,
    pub owner: String,
    pub source_filename: String,
    pub kind: JobKind,
    #[serde(default)]
    pub params: JobParams,
    /// Absolute path of the persisted upload.
    pub input: PathBuf,
}

/// Reject values that could escape a job-scoped directory when embedded
/// in a path. Applied to every caller-supplied field before any
/// filesystem activity.
pub fn validate_path_component(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let unsafe_value = value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0');
    if unsafe_value {
        Err(ValidationError::UnsafePathComponent { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            JobKind::Convert,
            JobKind::Separate,
            JobKind::Analyze,
            JobKind::Subtitle,
        ] {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!("remix".parse::<JobKind>().is_err());
    }

    #[test]
    fn path_traversal_is_rejected() {
        for bad in ["", "..", "../etc", "a/b", "a\\b", "nul\0l"] {
            assert!(validate_path_component("owner", bad).is_err(), "{bad:?}");
        }
        assert!(validate_path_component("owner", "user-42").is_ok());
        assert!(validate_path_component("owner", "song.mp4").is_ok());
    }
}
