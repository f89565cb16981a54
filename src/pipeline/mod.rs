pub mod sampler;
pub mod tally;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::media::VideoSource;
use crate::ml::Detector;
use crate::pipeline::sampler::Sampler;
use crate::pipeline::tally::{filter_confident, ActivitySummary, ActivityTally};
use crate::utils::config::PipelineConfig;

/// What a run produces: the ranked summary plus how many frames were actually
/// examined and how many of those the detector choked on.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub frames_sampled: u64,
    pub frames_failed: u64,
    pub summary: ActivitySummary,
}

/// One blocking forward pass: sample → detect → filter → accumulate, then
/// summarize once the source is exhausted.
///
/// A detector failure is scoped to its frame: that frame contributes zero
/// detections, the failure is logged and counted, and the pass continues.
/// Source errors (unreadable video) abort the run with no partial summary.
pub fn run<S, D>(
    source: S,
    detector: &mut D,
    config: &PipelineConfig,
    progress: &ProgressBar,
) -> Result<RunReport, PipelineError>
where
    S: VideoSource,
    D: Detector,
{
    config.validate()?;

    let mut sampler = Sampler::new(source, config.sampling_interval, config.target_resolution);
    info!(stride = sampler.stride(), "sampling stride resolved");

    let mut tally = ActivityTally::new();
    let mut frames_sampled = 0u64;
    let mut frames_failed = 0u64;

    while let Some(frame) = sampler.next_sample()? {
        frames_sampled += 1;
        match detector.detect(&frame.image) {
            Ok(detections) => {
                tally.accumulate(filter_confident(detections, config.confidence_threshold));
            }
            Err(err) => {
                frames_failed += 1;
                let err = PipelineError::DetectionFailure {
                    frame: frame.index,
                    reason: format!("{err:#}"),
                };
                warn!(%err, "frame contributes no detections");
            }
        }
        progress.inc(1);
    }

    info!(frames_sampled, frames_failed, "pass complete");
    Ok(RunReport {
        frames_sampled,
        frames_failed,
        summary: tally.summarize(),
    })
}
