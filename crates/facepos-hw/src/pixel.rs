//! Raw buffer to grayscale conversion and dark-frame detection.

use thiserror::Error;

/// Fraction of near-black pixels above which a frame counts as dark.
pub const DARK_FRAME_RATIO: f32 = 0.95;
const DARK_PIXEL_LEVEL: u8 = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PixelError {
    #[error("{format:?} buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// Pixel formats the camera accepts from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, two bytes per pixel; luma is every even byte.
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

impl PixelFormat {
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            b"Y16 " | b"Y16\0" => Some(Self::Y16),
            _ => None,
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Grey => 1,
            Self::Yuyv | Self::Y16 => 2,
        }
    }

    /// Extract an 8-bit luma plane of `width * height` bytes.
    pub fn to_gray(self, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PixelError> {
        let pixels = width as usize * height as usize;
        let expected = pixels * self.bytes_per_pixel();
        if buf.len() < expected {
            return Err(PixelError::ShortBuffer {
                format: self,
                expected,
                actual: buf.len(),
            });
        }
        let buf = &buf[..expected];
        Ok(match self {
            Self::Grey => buf.to_vec(),
            Self::Yuyv => buf.iter().step_by(2).copied().collect(),
            // High byte of each little-endian sample
            Self::Y16 => buf.chunks_exact(2).map(|s| s[1]).collect(),
        })
    }
}

/// True when more than `ratio` of the pixels are near black.
pub fn is_dark(gray: &[u8], ratio: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark = gray.iter().filter(|&&p| p < DARK_PIXEL_LEVEL).count();
    dark as f32 / gray.len() as f32 > ratio
}
