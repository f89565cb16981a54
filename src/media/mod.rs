pub mod ffmpeg;
pub mod mimetype;

use image::RgbImage;

use crate::error::PipelineError;

/// Static properties of an opened video, derived once at open time.
#[derive(Debug, Clone)]
pub struct VideoProperties {
    /// Frames per second. Zero when the container does not report a rate;
    /// the sampler treats that as "process every frame".
    pub frame_rate: f64,
    /// Total raw frame count, when the container reports one.
    pub total_frames: Option<u64>,
    pub width: u32,
    pub height: u32,
}

/// One decoded frame together with its ordinal index in the raw sequence.
#[derive(Debug)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

/// Boundary to the decode layer: an ordered, finite, single-pass sequence of
/// decoded RGB frames. Implementations must not require rewinding.
pub trait VideoSource {
    fn properties(&self) -> &VideoProperties;

    /// Next decoded frame, or `None` at end of stream. A mid-stream decode
    /// failure is fatal and surfaces as `UnreadableVideo`.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, PipelineError>;
}
