//! Per-job artifact directories.
//!
//! Each job owns one subtree under the processing root while it runs and
//! at most one file under the results root once it completes. Nothing is
//! ever shared between jobs.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::types::{JobId, JobKind, JobManifest};

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    processing_root: PathBuf,
    results_root: PathBuf,
}

impl ArtifactStore {
    pub fn open(
        processing_root: impl Into<PathBuf>,
        results_root: impl Into<PathBuf>,
    ) -> io::Result<Self> {
        let processing_root = processing_root.into();
        let results_root = results_root.into();
        fs::create_dir_all(&processing_root)?;
        fs::create_dir_all(&results_root)?;
        Ok(Self {
            processing_root,
            results_root,
        })
    }

    /// The job's private working directory.
    pub fn job_dir(&self, id: JobId) -> PathBuf {
        self.processing_root.join(id.to_string())
    }

    /// Allocate the working directory. Fails if it already exists, which
    /// preserves the one-directory-per-job guarantee.
    pub fn create_job_dir(&self, id: JobId) -> io::Result<PathBuf> {
        let dir = self.job_dir(id);
        fs::create_dir(&dir)?;
        Ok(dir)
    }

    /// Persist the uploaded bytes as `input.<ext>` inside the job
    /// directory. The open is no-clobber: an existing file is an error,
    /// never silently overwritten.
    pub fn save_input(&self, id: JobId, source_filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let ext = sanitized_extension(source_filename);
        let path = self.job_dir(id).join(format!("input.{ext}"));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(bytes)?;
        Ok(path)
    }

    pub fn manifest_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join("job.json")
    }

    pub fn write_manifest(&self, manifest: &JobManifest) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(manifest)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.manifest_path(manifest.id), bytes)
    }

    pub fn read_manifest(&self, id: JobId) -> io::Result<JobManifest> {
        let bytes = fs::read(self.manifest_path(id))?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Where the published result for this job kind lives.
    pub fn result_path(&self, id: JobId, kind: JobKind) -> PathBuf {
        self.results_root
            .join(format!("{id}.{}", kind.result_extension()))
    }

    /// Move the final artifact out of the working directory into the
    /// results root. Falls back to copy + delete when the two roots sit
    /// on different filesystems.
    pub fn publish_result(&self, id: JobId, kind: JobKind, produced: &Path) -> io::Result<PathBuf> {
        let dest = self.result_path(id, kind);
        if fs::rename(produced, &dest).is_err() {
            fs::copy(produced, &dest)?;
            fs::remove_file(produced)?;
        }
        Ok(dest)
    }

    /// Look up a published result without knowing the job kind.
    pub fn find_result(&self, id: JobId) -> io::Result<Option<PathBuf>> {
        let stem = id.to_string();
        for entry in fs::read_dir(&self.results_root)? {
            let path = entry?.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str()) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Remove the input and every intermediate artifact, keeping the
    /// published result. Idempotent.
    pub fn cleanup_intermediate(&self, id: JobId) -> io::Result<()> {
        match fs::remove_dir_all(self.job_dir(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove everything the job ever produced, result included.
    /// Idempotent.
    pub fn cleanup_all(&self, id: JobId) -> io::Result<()> {
        self.cleanup_intermediate(id)?;
        if let Some(result) = self.find_result(id)? {
            match fs::remove_file(result) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Keep only a plain alphanumeric extension from the uploaded name; an
/// upload with anything odd lands as `input.bin`.
fn sanitized_extension(source_filename: &str) -> String {
    Path::new(source_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobParams;
    use uuid::Uuid;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            ArtifactStore::open(dir.path().join("processing"), dir.path().join("results")).unwrap();
        (dir, store)
    }

    #[test]
    fn job_dirs_are_exclusive() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).unwrap();
        assert!(store.create_job_dir(id).is_err());
        assert!(store.create_job_dir(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn input_write_refuses_to_clobber() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).unwrap();
        let path = store.save_input(id, "song.mp4", b"abc").unwrap();
        assert!(path.ends_with("input.mp4"));
        assert!(store.save_input(id, "song.mp4", b"xyz").is_err());
        assert_eq!(fs::read(path).unwrap(), b"abc");
    }

    #[test]
    fn odd_extensions_are_neutralized() {
        assert_eq!(sanitized_extension("a.mp3"), "mp3");
        assert_eq!(sanitized_extension("a.MP4"), "mp4");
        assert_eq!(sanitized_extension("noext"), "bin");
        assert_eq!(sanitized_extension("trick../.."), "bin");
    }

    #[test]
    fn manifest_round_trips() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).unwrap();
        let manifest = JobManifest {
            id,
            owner: "user-1".into(),
            source_filename: "clip.mp4".into(),
            kind: JobKind::Subtitle,
            params: JobParams::default(),
            input: store.job_dir(id).join("input.mp4"),
        };
        store.write_manifest(&manifest).unwrap();
        let back = store.read_manifest(id).unwrap();
        assert_eq!(back.kind, JobKind::Subtitle);
        assert_eq!(back.owner, "user-1");
    }

    #[test]
    fn publish_then_find_result() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        let work = store.create_job_dir(id).unwrap();
        let produced = work.join("out.mp3");
        fs::write(&produced, b"mp3 bytes").unwrap();
        let dest = store.publish_result(id, JobKind::Convert, &produced).unwrap();
        assert!(!produced.exists());
        assert_eq!(store.find_result(id).unwrap(), Some(dest));
        assert_eq!(store.find_result(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        let work = store.create_job_dir(id).unwrap();
        fs::write(work.join("intermediate.wav"), b"pcm").unwrap();
        let produced = work.join("out.mp3");
        fs::write(&produced, b"mp3").unwrap();
        store.publish_result(id, JobKind::Convert, &produced).unwrap();

        store.cleanup_intermediate(id).unwrap();
        assert!(!store.job_dir(id).exists());
        assert!(store.find_result(id).unwrap().is_some());
        store.cleanup_intermediate(id).unwrap();

        store.cleanup_all(id).unwrap();
        assert!(store.find_result(id).unwrap().is_none());
        store.cleanup_all(id).unwrap();
    }
}
