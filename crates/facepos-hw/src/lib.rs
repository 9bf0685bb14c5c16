//! facepos-hw — Camera access for still capture.
//!
//! Opens a V4L2 device, negotiates a pixel format, and hands out grayscale
//! [`facepos_core::CaptureFrame`]s.

pub mod camera;
pub mod pixel;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use pixel::PixelFormat;
