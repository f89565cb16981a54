use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error taxonomy.
///
/// `UnreadableVideo` and `Configuration` are fatal and abort the run before
/// any summary is produced. `DetectionFailure` is scoped to a single sampled
/// frame: the orchestrator logs it and continues, so it never propagates out
/// of the run loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unreadable video {path:?}: {reason}")]
    UnreadableVideo { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("detection failed on frame {frame}: {reason}")]
    DetectionFailure { frame: u64, reason: String },
}

impl PipelineError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnreadableVideo {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
