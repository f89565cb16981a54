use anyhow::{anyhow, Result};
use image::RgbImage;
use ndarray::{Array, Array4, ArrayViewD, Axis};

use crate::ml::Detection;

/// COCO-80 class names, matching the output head of stock YOLOv8 exports.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Anchors scoring below this are dropped before NMS. This is a decoding
/// floor, not the pipeline's confidence threshold (which is applied strictly
/// downstream, after the detector returns).
const CANDIDATE_FLOOR: f32 = 0.05;

struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    class_id: usize,
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// Resize to the square model input and pack into an NCHW f32 tensor
/// normalized to [0, 1].
pub fn normalize_for_yolo(image: &RgbImage, size: u32) -> Result<Array4<f32>> {
    let resized = image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);
    let mut array = Array::zeros((1, 3, size as usize, size as usize));

    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        array[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        array[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        array[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    Ok(array)
}

/// Decode a YOLOv8 detection head of shape [1, 4 + classes, anchors]: take
/// the best class per anchor, then class-aware NMS so one object is not
/// reported once per overlapping anchor. Box geometry is used only for NMS;
/// the pipeline consumes (label, confidence) pairs.
pub fn decode_predictions(
    preds: &ArrayViewD<'_, f32>,
    iou_threshold: f32,
) -> Result<Vec<Detection>> {
    let shape = preds.shape();
    if shape.len() != 3 {
        return Err(anyhow!("unexpected output rank {} (want 3)", shape.len()));
    }
    let channels = shape[1];
    if channels <= 4 {
        return Err(anyhow!("output has {channels} channels, no class scores"));
    }
    let num_classes = (channels - 4).min(COCO_CLASSES.len());
    let anchors = shape[2];

    let batch = preds.index_axis(Axis(0), 0);

    let mut candidates = Vec::new();
    for i in 0..anchors {
        let mut class_id = 0;
        let mut score = f32::MIN;
        for c in 0..num_classes {
            let s = batch[[4 + c, i]];
            if s > score {
                score = s;
                class_id = c;
            }
        }
        if score < CANDIDATE_FLOOR {
            continue;
        }

        let cx = batch[[0, i]];
        let cy = batch[[1, i]];
        let w = batch[[2, i]];
        let h = batch[[3, i]];
        candidates.push(Candidate {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            class_id,
            score,
        });
    }

    Ok(non_max_suppression(candidates, iou_threshold))
}

fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.iou(&cand) > iou_threshold);
        if !suppressed {
            kept.push(cand);
        }
    }

    kept.into_iter()
        .map(|c| Detection::new(COCO_CLASSES[c.class_id], c.score))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    // Output tensor [1, 84, anchors], one anchor column per tuple.
    fn head(anchors: &[(f32, f32, f32, f32, usize, f32)]) -> Array3<f32> {
        let mut preds = Array3::zeros((1, 84, anchors.len()));
        for (i, &(cx, cy, w, h, class, score)) in anchors.iter().enumerate() {
            preds[[0, 0, i]] = cx;
            preds[[0, 1, i]] = cy;
            preds[[0, 2, i]] = w;
            preds[[0, 3, i]] = h;
            preds[[0, 4 + class, i]] = score;
        }
        preds
    }

    #[test]
    fn normalize_produces_unit_range_nchw() {
        let mut image = RgbImage::new(8, 4);
        image.put_pixel(0, 0, image::Rgb([255, 128, 0]));
        let tensor = normalize_for_yolo(&image, 8).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        for &v in tensor.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn overlapping_anchors_of_one_object_collapse_to_one_detection() {
        let preds = head(&[
            (100.0, 100.0, 50.0, 50.0, 15, 0.9),
            (102.0, 101.0, 50.0, 50.0, 15, 0.6),
            (400.0, 400.0, 40.0, 40.0, 16, 0.8),
        ]);
        let dets = decode_predictions(&preds.view().into_dyn(), 0.45).unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0], Detection::new("cat", 0.9));
        assert_eq!(dets[1], Detection::new("dog", 0.8));
    }

    #[test]
    fn same_spot_different_classes_both_survive() {
        let preds = head(&[
            (100.0, 100.0, 50.0, 50.0, 15, 0.9),
            (100.0, 100.0, 50.0, 50.0, 16, 0.7),
        ]);
        let dets = decode_predictions(&preds.view().into_dyn(), 0.45).unwrap();
        assert_eq!(dets.len(), 2);
    }

    #[test]
    fn sub_floor_anchors_are_dropped() {
        let preds = head(&[(100.0, 100.0, 50.0, 50.0, 0, 0.01)]);
        let dets = decode_predictions(&preds.view().into_dyn(), 0.45).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn rejects_malformed_output_shapes() {
        let preds = Array3::<f32>::zeros((1, 3, 10));
        assert!(decode_predictions(&preds.view().into_dyn(), 0.45).is_err());
    }
}
