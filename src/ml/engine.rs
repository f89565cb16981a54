use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;
use ort::session::Session;

use crate::ml::{pipeline, Detection, Detector};

const INPUT_SIZE: u32 = 640;
const IOU_THRESHOLD: f32 = 0.45;

/// YOLOv8 detector backed by an ONNX Runtime session.
pub struct YoloDetector {
    session: Session,
}

impl YoloDetector {
    pub fn load(model_path: &Path) -> Result<Self> {
        // Global environment; re-init after the first call is a no-op we can
        // safely ignore.
        let _ = ort::init().with_name("video-activity-inference").commit();

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load detection model {model_path:?}"))?;

        Ok(Self { session })
    }
}

impl Detector for YoloDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let input = pipeline::normalize_for_yolo(image, INPUT_SIZE)?;

        let outputs = self
            .session
            .run(ort::inputs!["images" => input.view()]?)
            .context("inference failed")?;

        let preds = outputs["output0"]
            .try_extract_tensor::<f32>()
            .context("failed to extract detection output tensor")?;

        pipeline::decode_predictions(&preds, IOU_THRESHOLD)
    }
}
