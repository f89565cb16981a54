use crate::error::PipelineError;
use crate::media::{Frame, VideoSource};
use crate::utils::config::SamplingInterval;

/// Gap, in raw frames, between consecutive samples. An unknown or degenerate
/// frame rate falls back to stride 1 (process every frame) rather than
/// failing the run.
pub fn resolve_stride(frame_rate: f64, interval: SamplingInterval) -> u64 {
    match interval {
        SamplingInterval::EveryFrame => 1,
        SamplingInterval::Seconds(secs) => {
            if !frame_rate.is_finite() || frame_rate <= 0.0 {
                return 1;
            }
            ((frame_rate * secs).round() as u64).max(1)
        }
    }
}

/// Walks a video source in a single forward pass and yields only the frames
/// whose index is divisible by the stride, optionally resized to a fixed
/// resolution so the detector sees a uniform input shape.
pub struct Sampler<S> {
    source: S,
    stride: u64,
    next_index: u64,
    target_resolution: Option<(u32, u32)>,
}

impl<S: VideoSource> Sampler<S> {
    pub fn new(
        source: S,
        interval: SamplingInterval,
        target_resolution: Option<(u32, u32)>,
    ) -> Self {
        let stride = resolve_stride(source.properties().frame_rate, interval);
        Self {
            source,
            stride,
            next_index: 0,
            target_resolution,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn next_sample(&mut self) -> Result<Option<Frame>, PipelineError> {
        while let Some(image) = self.source.next_frame()? {
            let index = self.next_index;
            self.next_index += 1;
            if index % self.stride != 0 {
                continue;
            }

            let image = match self.target_resolution {
                Some((w, h)) => {
                    image::imageops::resize(&image, w, h, image::imageops::FilterType::Triangle)
                }
                None => image,
            };
            return Ok(Some(Frame { index, image }));
        }
        Ok(None)
    }
}
