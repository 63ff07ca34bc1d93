//! Concrete pipeline stages.
//!
//! Each stage wraps one external tool or service; the orchestration
//! core only sees the [`Stage`] contract.

mod analyze;
mod captions;
mod convert;
mod extract;
mod mux;
mod package;
mod separate;
mod transcribe;

pub use analyze::AnalyzeVocals;
pub use captions::GenerateCaptions;
pub use convert::TranscodeToMp3;
pub use extract::ExtractAudio;
pub use mux::BurnSubtitles;
pub use package::PackageStems;
pub use separate::SeparateStems;
pub use transcribe::{Cue, Transcribe};

use crate::stage::Stage;
use crate::types::JobKind;

/// The fixed, ordered stage list for a job kind.
///
/// Called once per worker process, so every stage instance starts from a
/// clean slate; nothing here is ever shared across jobs.
pub fn pipeline_for(kind: JobKind) -> Vec<Box<dyn Stage>> {
    match kind {
        JobKind::Convert => vec![Box::new(TranscodeToMp3)],
        JobKind::Separate => vec![Box::new(SeparateStems), Box::new(PackageStems)],
        JobKind::Analyze => vec![Box::new(SeparateStems), Box::new(AnalyzeVocals)],
        JobKind::Subtitle => vec![
            Box::new(ExtractAudio),
            Box::new(Transcribe),
            Box::new(GenerateCaptions),
            Box::new(BurnSubtitles),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_nonempty_pipeline() {
        for kind in [
            JobKind::Convert,
            JobKind::Separate,
            JobKind::Analyze,
            JobKind::Subtitle,
        ] {
            assert!(!pipeline_for(kind).is_empty());
        }
    }

    #[test]
    fn subtitle_pipeline_orders_stages() {
        let names: Vec<_> = pipeline_for(JobKind::Subtitle)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, ["extract_audio", "transcribe", "captions", "mux"]);
    }
}
