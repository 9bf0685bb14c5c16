//! facepos-core — Face position validation.
//!
//! Decides whether a single detected face is centered and clearly visible
//! in a captured still. Ships an SCRFD detector running on ONNX Runtime as
//! the default face-detection collaborator.

pub mod decode;
pub mod detector;
pub mod session;
pub mod source;
pub mod types;
pub mod validator;

pub use decode::{decode_still, load_still, StillFile};
pub use detector::{DetectorError, ScrfdDetector};
pub use session::{CheckSession, SessionError, SessionState};
pub use source::{FaceDetect, FrameSource};
pub use types::{
    BoundingBox, CaptureFrame, DetectionResult, FrameError, LandmarkLayout, Landmarks, Point,
    PositionVerdict,
};
pub use validator::{ConfigError, PositionValidator, ValidatorConfig};
