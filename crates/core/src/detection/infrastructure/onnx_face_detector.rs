/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing, then
/// reports each surviving face as a normalized `(y1, x1, y2, x2)` box.
use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Scores below this never leave the detector. The tracker applies its own,
/// stricter thresholds on top.
pub const DEFAULT_SCORE_FLOOR: f64 = 0.3;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxFaceDetector {
    session: ort::session::Session,
    score_floor: f64,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, score_floor: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // [N, C, H, W], square input assumed
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} (input {input_size}x{input_size})",
            model_path.display()
        );

        Ok(Self {
            session,
            score_floor,
            input_size,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let fw = frame.width() as f64;
        let fh = frame.height() as f64;

        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // [1, features, detections] or [1, detections, features]
        if shape.len() != 3 {
            return Err(format!("Unexpected face model output shape: {shape:?}").into());
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Ok(Vec::new());
        }

        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let feature = |det: usize, feat: usize| -> f64 {
            if transposed {
                data[feat * num_dets + det] as f64
            } else {
                data[det * num_feats + feat] as f64
            }
        };

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let score = feature(i, 4);
            if !passes_floor(score, self.score_floor) {
                continue;
            }
            let cx = feature(i, 0);
            let cy = feature(i, 1);
            let w = feature(i, 2);
            let h = feature(i, 3);

            // letterbox coords -> source pixels -> normalized
            let x1 = ((cx - w / 2.0) - pad_x as f64) / scale / fw;
            let y1 = ((cy - h / 2.0) - pad_y as f64) / scale / fh;
            let x2 = ((cx + w / 2.0) - pad_x as f64) / scale / fw;
            let y2 = ((cy + h / 2.0) - pad_y as f64) / scale / fh;

            candidates.push(Detection::new(
                BoundingBox::new(
                    y1.clamp(0.0, 1.0),
                    x1.clamp(0.0, 1.0),
                    y2.clamp(0.0, 1.0),
                    x2.clamp(0.0, 1.0),
                ),
                score,
            ));
        }

        let kept = nms(&mut candidates, NMS_IOU_THRESH);
        log::trace!("detected {} faces in frame {}", kept.len(), frame.index());
        Ok(kept)
    }
}

/// Non-finite scores are model noise and never pass.
fn passes_floor(score: f64, floor: f64) -> bool {
    score.is_finite() && score >= floor
}

/// Hardware execution provider for the current platform; ort falls back to
/// CPU when it cannot be registered.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114/255 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy NMS: sort by score descending, suppress overlapping boxes.
fn nms(dets: &mut [Detection], iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && iou(&dets[i].bbox, &dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let y1 = a.y1.max(b.y1);
    let x1 = a.x1.max(b.x1);
    let y2 = a.y2.min(b.y2);
    let x2 = a.x2.min(b.x2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    inter / (a.area() + b.area() - inter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(y1: f64, x1: f64, y2: f64, x2: f64, score: f64) -> Detection {
        Detection::new(BoundingBox::new(y1, x1, y2, x2), score)
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 -> 640: scale 3.2, new 640x320, pad_y 160
        let data = vec![128u8; 200 * 100 * 3];
        let frame = Frame::new(data, 200, 100, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let data = vec![255u8; 100 * 50 * 3];
        let frame = Frame::new(data, 100, 50, 3, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert!((tensor[[0, 0, y, x]] - 1.0).abs() < 0.01);

        let pad_val = 114.0 / 255.0;
        assert!((tensor[[0, 0, 0, 0]] - pad_val).abs() < 0.01);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![
            det(0.0, 0.0, 0.5, 0.5, 0.9),
            det(0.02, 0.02, 0.52, 0.52, 0.8),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping_in_score_order() {
        let mut dets = vec![
            det(0.0, 0.0, 0.2, 0.2, 0.6),
            det(0.5, 0.5, 0.8, 0.8, 0.95),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_nms_empty_input() {
        let mut dets: Vec<Detection> = Vec::new();
        assert!(nms(&mut dets, 0.3).is_empty());
    }

    #[test]
    fn test_score_floor_rejects_nan() {
        assert!(passes_floor(0.3, DEFAULT_SCORE_FLOOR));
        assert!(!passes_floor(0.29, DEFAULT_SCORE_FLOOR));
        assert!(!passes_floor(f64::NAN, DEFAULT_SCORE_FLOOR));
        assert!(!passes_floor(f64::INFINITY, DEFAULT_SCORE_FLOOR));
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 0.5, 0.5);
        let b = BoundingBox::new(0.6, 0.6, 0.9, 0.9);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-9);
        assert_eq!(iou(&a, &b), 0.0);
    }
}
