//! Collaborator seams: where frames come from and who finds the face.

use crate::types::{CaptureFrame, DetectionResult};

/// Supplies a still on demand (camera, file, test fixture).
pub trait FrameSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn capture(&mut self) -> Result<CaptureFrame, Self::Error>;
}

/// Finds at most one face in a frame.
///
/// `Ok(None)` means no face was found. Model or inference failures are
/// reported as `Err` and must not be folded into a negative verdict.
pub trait FaceDetect {
    type Error: std::error::Error + Send + Sync + 'static;

    fn detect_single(&mut self, frame: &CaptureFrame) -> Result<Option<DetectionResult>, Self::Error>;
}
