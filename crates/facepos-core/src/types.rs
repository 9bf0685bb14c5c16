use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame has zero size: {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("frame buffer length mismatch: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("empty image data")]
    EmptyInput,
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// A captured still, held as 8-bit grayscale.
///
/// Width and height are always positive; the validator uses `width` as the
/// centering reference.
#[derive(Clone)]
pub struct CaptureFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl CaptureFrame {
    /// Wrap a row-major grayscale buffer of `width * height` bytes.
    pub fn from_gray(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Horizontal midpoint in pixel space.
    pub fn center_x(&self) -> f32 {
        self.width as f32 / 2.0
    }
}

impl std::fmt::Debug for CaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Landmark numbering scheme used by the detector that produced a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkLayout {
    /// SCRFD/InsightFace: [left_eye, right_eye, nose, left_mouth, right_mouth].
    FivePoint,
    /// iBUG 68-point markup; the nose group spans indices 27..=35.
    SixtyEightPoint,
}

impl LandmarkLayout {
    /// Index of the point used as the nose anchor.
    pub fn nose_index(self) -> usize {
        match self {
            Self::FivePoint => 2,
            Self::SixtyEightPoint => 27,
        }
    }
}

/// Facial landmarks as reported by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmarks {
    pub layout: LandmarkLayout,
    pub points: Vec<Point>,
}

impl Landmarks {
    pub fn five_point(points: [(f32, f32); 5]) -> Self {
        Self {
            layout: LandmarkLayout::FivePoint,
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    /// Nose anchor, or `None` if the set is too short for its layout or the
    /// point is not finite.
    ///
    /// Both coordinates must be finite even though centering only reads `x`:
    /// a non-finite `y` means the detector output for this point is corrupt.
    pub fn nose(&self) -> Option<Point> {
        self.points
            .get(self.layout.nose_index())
            .copied()
            .filter(Point::is_finite)
    }
}

/// Axis-aligned face box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = ((self.x + self.width).min(other.x + other.width) - self.x.max(other.x)).max(0.0);
        let inter_h =
            ((self.y + self.height).min(other.y + other.height) - self.y.max(other.y)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// A single face found by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub bbox: BoundingBox,
    /// Detector score in [0, 1].
    pub confidence: f32,
    #[serde(default)]
    pub landmarks: Option<Landmarks>,
}

impl DetectionResult {
    pub fn nose(&self) -> Option<Point> {
        self.landmarks.as_ref().and_then(Landmarks::nose)
    }
}

/// Parse detector output from JSON. `null` means no face was found.
pub fn parse_detection(json: &str) -> Result<Option<DetectionResult>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Outcome of a single position check.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionVerdict {
    pub positioned: bool,
    pub centered: bool,
    pub visible: bool,
    /// Nose offset from the horizontal midpoint, when a nose was found.
    pub offset_px: Option<f32>,
    /// Detector confidence, when a nose was found.
    pub confidence: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_zero_width() {
        let err = CaptureFrame::from_gray(vec![], 0, 10).unwrap_err();
        assert!(matches!(err, FrameError::EmptyDimensions { width: 0, height: 10 }));
    }

    #[test]
    fn test_frame_rejects_short_buffer() {
        let err = CaptureFrame::from_gray(vec![0u8; 10], 4, 4).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidLength {
                expected: 16,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_frame_center() {
        let frame = CaptureFrame::from_gray(vec![0u8; 1280 * 2], 1280, 2).unwrap();
        assert_eq!(frame.center_x(), 640.0);
    }

    #[test]
    fn test_five_point_nose() {
        let lms = Landmarks::five_point([
            (10.0, 10.0),
            (30.0, 10.0),
            (20.0, 20.0),
            (12.0, 30.0),
            (28.0, 30.0),
        ]);
        assert_eq!(lms.nose(), Some(Point::new(20.0, 20.0)));
    }

    #[test]
    fn test_sixty_eight_point_nose() {
        let mut points = vec![Point::new(0.0, 0.0); 68];
        points[27] = Point::new(321.0, 200.0);
        let lms = Landmarks {
            layout: LandmarkLayout::SixtyEightPoint,
            points,
        };
        assert_eq!(lms.nose(), Some(Point::new(321.0, 200.0)));
    }

    #[test]
    fn test_truncated_landmarks_have_no_nose() {
        let lms = Landmarks {
            layout: LandmarkLayout::SixtyEightPoint,
            points: vec![Point::new(1.0, 1.0); 20],
        };
        assert!(lms.nose().is_none());
    }

    #[test]
    fn test_nan_nose_is_unusable() {
        let lms = Landmarks::five_point([
            (0.0, 0.0),
            (0.0, 0.0),
            (f32::NAN, 5.0),
            (0.0, 0.0),
            (0.0, 0.0),
        ]);
        assert!(lms.nose().is_none());
    }

    #[test]
    fn test_non_finite_nose_y_is_unusable() {
        let lms = Landmarks::five_point([
            (0.0, 0.0),
            (0.0, 0.0),
            (640.0, f32::INFINITY),
            (0.0, 0.0),
            (0.0, 0.0),
        ]);
        assert!(lms.nose().is_none());
    }

    #[test]
    fn test_iou_partial() {
        let a = BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = BoundingBox { x: 5.0, y: 0.0, width: 10.0, height: 10.0 };
        // Overlap 50, union 150
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        let b = BoundingBox { x: 20.0, y: 20.0, width: 10.0, height: 10.0 };
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_parse_detection_null() {
        assert!(parse_detection("null").unwrap().is_none());
    }

    #[test]
    fn test_parse_detection_without_landmarks() {
        let json = r#"{"bbox":{"x":1,"y":2,"width":3,"height":4},"confidence":0.7}"#;
        let det = parse_detection(json).unwrap().unwrap();
        assert!((det.confidence - 0.7).abs() < 1e-6);
        assert!(det.landmarks.is_none());
        assert!(det.nose().is_none());
    }

    #[test]
    fn test_parse_detection_five_point() {
        let json = r#"{
            "bbox": {"x": 500, "y": 200, "width": 280, "height": 320},
            "confidence": 0.93,
            "landmarks": {
                "layout": "five_point",
                "points": [
                    {"x": 590, "y": 300}, {"x": 690, "y": 300}, {"x": 641, "y": 360},
                    {"x": 600, "y": 420}, {"x": 680, "y": 420}
                ]
            }
        }"#;
        let det = parse_detection(json).unwrap().unwrap();
        assert_eq!(det.nose(), Some(Point::new(641.0, 360.0)));
    }
}
