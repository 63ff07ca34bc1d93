use std::fs;
use std::io;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::StageError;
use crate::stage::{Stage, StageContext};

/// Bundle the separated stem wavs into one downloadable zip.
pub struct PackageStems;

const NAME: &str = "package";

#[async_trait]
impl Stage for PackageStems {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detail(&self) -> String {
        "bundling stems into an archive".to_string()
    }

    async fn run(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let stems_dir = ctx.current.clone();
        let archive_path = ctx.work_dir.join("stems.zip");

        let file = fs::File::create(&archive_path)
            .map_err(|e| StageError::new(NAME, format!("creating archive: {e}")))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut packed = 0usize;
        let entries = fs::read_dir(&stems_dir)
            .map_err(|e| StageError::new(NAME, format!("reading stems dir: {e}")))?;
        for entry in entries {
            let path = entry
                .map_err(|e| StageError::new(NAME, e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| StageError::new(NAME, "stem file has a non-utf8 name"))?
                .to_string();
            writer
                .start_file(name, options)
                .map_err(|e| StageError::new(NAME, format!("writing archive entry: {e}")))?;
            let mut stem = fs::File::open(&path)
                .map_err(|e| StageError::new(NAME, format!("opening stem: {e}")))?;
            io::copy(&mut stem, &mut writer)
                .map_err(|e| StageError::new(NAME, format!("copying stem into archive: {e}")))?;
            packed += 1;
        }
        writer
            .finish()
            .map_err(|e| StageError::new(NAME, format!("finalizing archive: {e}")))?;

        if packed == 0 {
            return Err(StageError::new(NAME, "no stems found to package"));
        }
        ctx.hand_off(archive_path);
        Ok(())
    }
}
