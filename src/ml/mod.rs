pub mod engine;
pub mod pipeline;

use anyhow::Result;
use image::RgbImage;

/// One labeled observation produced by the detector for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    /// In [0, 1].
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Black-box detection capability: one image in, zero or more labeled
/// detections out. The pipeline owns no detector state beyond invocation, so
/// model variants (fast/accurate) are just different implementations or
/// different weights behind this trait.
pub trait Detector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;
}
