//! SCRFD face detector via ONNX Runtime.
//!
//! Letterboxes the still to the 640×640 model input, decodes the three
//! anchor-free stride heads, suppresses overlaps, and maps boxes and the
//! five-point landmarks back into frame coordinates.

use crate::source::FaceDetect;
use crate::types::{BoundingBox, CaptureFrame, DetectionResult, LandmarkLayout, Landmarks, Point};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Named constants ---
const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_SCORE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// File name of the detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download det_10g.onnx from insightface into the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Path of the SCRFD model inside `model_dir`.
pub fn model_path(model_dir: &Path) -> PathBuf {
    model_dir.join(SCRFD_MODEL_FILE)
}

/// Scale and padding applied when fitting a frame into the square input.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f32,
    new_width: u32,
    new_height: u32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, target);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, target);
        Self {
            scale,
            new_width,
            new_height,
            pad_x: (target - new_width) / 2,
            pad_y: (target - new_height) / 2,
        }
    }

    /// Map a point in model input space back to frame space.
    fn unproject(&self, x: f32, y: f32) -> Point {
        Point::new(
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Output tensor indices for one stride head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrideOutputs {
    score: usize,
    bbox: usize,
    kps: usize,
}

/// Standard export order: scores 8/16/32, then boxes, then keypoints.
const POSITIONAL_OUTPUTS: [StrideOutputs; 3] = [
    StrideOutputs { score: 0, bbox: 3, kps: 6 },
    StrideOutputs { score: 1, bbox: 4, kps: 7 },
    StrideOutputs { score: 2, bbox: 5, kps: 8 },
];

/// SCRFD-based face detector.
pub struct ScrfdDetector {
    session: Session,
    outputs: [StrideOutputs; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(path = %model_path.display(), outputs = ?names, "loaded SCRFD model");

        if names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model needs 9 outputs (score/bbox/kps per stride), got {}",
                names.len()
            )));
        }

        Ok(Self {
            session,
            outputs: map_outputs(&names),
        })
    }

    /// Detect all faces above the score threshold, best first.
    pub fn detect(&mut self, frame: &CaptureFrame) -> Result<Vec<DetectionResult>, DetectorError> {
        let (input, letterbox) = preprocess(frame)?;
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (head, &stride) in self.outputs.iter().zip(SCRFD_STRIDES.iter()) {
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
            };
            let scores = extract(head.score, "scores")?;
            let bboxes = extract(head.bbox, "bboxes")?;
            let kps = extract(head.kps, "kps")?;
            candidates.extend(decode_stride(scores, bboxes, kps, stride, &letterbox));
        }

        let faces = suppress(candidates, SCRFD_NMS_THRESHOLD);
        tracing::debug!(faces = faces.len(), "SCRFD detection complete");
        Ok(faces)
    }
}

impl FaceDetect for ScrfdDetector {
    type Error = DetectorError;

    fn detect_single(&mut self, frame: &CaptureFrame) -> Result<Option<DetectionResult>, DetectorError> {
        Ok(self.detect(frame)?.into_iter().next())
    }
}

/// Resize into the letterboxed NCHW input. Padding stays at zero, which is
/// the normalized value of `SCRFD_MEAN`.
fn preprocess(frame: &CaptureFrame) -> Result<(Array4<f32>, Letterbox), DetectorError> {
    let letterbox = Letterbox::fit(frame.width(), frame.height(), SCRFD_INPUT_SIZE);
    let source = GrayImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| DetectorError::InferenceFailed("frame buffer does not match its size".into()))?;
    let resized = imageops::resize(
        &source,
        letterbox.new_width,
        letterbox.new_height,
        FilterType::Triangle,
    );

    let size = SCRFD_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let value = (pixel.0[0] as f32 - SCRFD_MEAN) / SCRFD_STD;
        let (ty, tx) = ((y + letterbox.pad_y) as usize, (x + letterbox.pad_x) as usize);
        // Grayscale replicated across the three colour channels
        for channel in 0..3 {
            tensor[[0, channel, ty, tx]] = value;
        }
    }

    Ok((tensor, letterbox))
}

/// Resolve output tensors by name ("score_8", "bbox_16", "kps_32", ...),
/// falling back to the positional export order.
fn map_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |kind: &str, stride: usize| {
        let target = format!("{kind}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| {
            Some(StrideOutputs {
                score: find("score", stride)?,
                bbox: find("bbox", stride)?,
                kps: find("kps", stride)?,
            })
        })
        .collect();

    match named.and_then(|heads| <[StrideOutputs; 3]>::try_from(heads).ok()) {
        Some(heads) => {
            tracing::debug!(?heads, "SCRFD: name-based output mapping");
            heads
        }
        None => {
            tracing::debug!(?names, "SCRFD: output names not recognized, using positional mapping");
            POSITIONAL_OUTPUTS
        }
    }
}

/// Decode the anchors of one stride head that clear the score threshold.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
) -> Vec<DetectionResult> {
    let cols = SCRFD_INPUT_SIZE as usize / stride;
    let anchors = cols * cols * SCRFD_ANCHORS_PER_CELL;
    let step = stride as f32;

    (0..anchors)
        .filter_map(|idx| {
            let confidence = *scores.get(idx)?;
            if confidence <= SCRFD_SCORE_THRESHOLD {
                return None;
            }

            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let ax = (cell % cols) as f32 * step;
            let ay = (cell / cols) as f32 * step;

            let d = bboxes.get(idx * 4..idx * 4 + 4)?;
            let top_left = letterbox.unproject(ax - d[0] * step, ay - d[1] * step);
            let bottom_right = letterbox.unproject(ax + d[2] * step, ay + d[3] * step);

            let landmarks = kps.get(idx * 10..idx * 10 + 10).map(|k| Landmarks {
                layout: LandmarkLayout::FivePoint,
                points: k
                    .chunks_exact(2)
                    .map(|p| letterbox.unproject(ax + p[0] * step, ay + p[1] * step))
                    .collect(),
            });

            Some(DetectionResult {
                bbox: BoundingBox {
                    x: top_left.x,
                    y: top_left.y,
                    width: bottom_right.x - top_left.x,
                    height: bottom_right.y - top_left.y,
                },
                confidence,
                landmarks,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression. Output is sorted by confidence, best first.
fn suppress(mut candidates: Vec<DetectionResult>, iou_threshold: f32) -> Vec<DetectionResult> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<DetectionResult> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| k.bbox.iou(&candidate.bbox) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
