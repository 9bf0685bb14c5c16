//! Decoding encoded stills (JPEG, PNG, ...) into grayscale capture frames.

use crate::source::FrameSource;
use crate::types::{CaptureFrame, FrameError};
use std::path::{Path, PathBuf};

/// Decode an encoded image held in memory.
pub fn decode_still(bytes: &[u8]) -> Result<CaptureFrame, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::EmptyInput);
    }
    let gray = image::load_from_memory(bytes)?.into_luma8();
    let (width, height) = gray.dimensions();
    tracing::debug!(width, height, "decoded still");
    CaptureFrame::from_gray(gray.into_raw(), width, height)
}

/// Read and decode an image file.
pub fn load_still(path: impl AsRef<Path>) -> Result<CaptureFrame, FrameError> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_still(&bytes)
}

/// A still on disk used as a frame source; every capture re-reads the file.
#[derive(Debug, Clone)]
pub struct StillFile {
    path: PathBuf,
}

impl StillFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for StillFile {
    type Error = FrameError;

    fn capture(&mut self) -> Result<CaptureFrame, FrameError> {
        load_still(&self.path)
    }
}
