//! Face position validation.
//!
//! Decides whether a detected face is centered horizontally and confidently
//! visible in a captured still. The check is pure: capture and inference
//! happen before it, in the collaborators.

use crate::types::{CaptureFrame, DetectionResult, PositionVerdict};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use thiserror::Error;

pub const DEFAULT_CENTER_TOLERANCE_PX: f32 = 50.0;
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("center tolerance must be a positive number of pixels, got {0}")]
    InvalidTolerance(f32),
    #[error("visibility threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
}

/// Thresholds for a position check. Both comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Maximum nose offset from the horizontal midpoint, exclusive.
    pub center_tolerance_px: f32,
    /// Minimum detector confidence, exclusive.
    pub visibility_threshold: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            center_tolerance_px: DEFAULT_CENTER_TOLERANCE_PX,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.center_tolerance_px.is_finite() || self.center_tolerance_px <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.center_tolerance_px));
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(ConfigError::InvalidThreshold(self.visibility_threshold));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PositionValidator {
    config: ValidatorConfig,
}

impl PositionValidator {
    pub fn new(config: ValidatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Evaluate one detection against the frame it came from.
    ///
    /// A missing detection or one without a usable nose landmark is the
    /// ordinary "no face yet" case and yields an all-false verdict.
    pub fn evaluate(
        &self,
        frame: &CaptureFrame,
        detection: Option<&DetectionResult>,
    ) -> PositionVerdict {
        self.judge(frame.width(), detection)
    }

    /// Evaluate a detection when only the source image width is known.
    pub fn evaluate_width(
        &self,
        width: NonZeroU32,
        detection: Option<&DetectionResult>,
    ) -> PositionVerdict {
        self.judge(width.get(), detection)
    }

    fn judge(&self, width: u32, detection: Option<&DetectionResult>) -> PositionVerdict {
        let Some((detection, nose)) = detection.and_then(|d| d.nose().map(|n| (d, n))) else {
            tracing::debug!(
                detected = detection.is_some(),
                "nose position not detected or landmarks not available"
            );
            return PositionVerdict::default();
        };

        let offset = (nose.x - width as f32 / 2.0).abs();
        let centered = offset < self.config.center_tolerance_px;
        let visible = detection.confidence > self.config.visibility_threshold;

        tracing::debug!(
            nose_x = nose.x,
            width,
            offset,
            confidence = detection.confidence,
            centered,
            visible,
            "evaluated face position"
        );

        PositionVerdict {
            positioned: centered && visible,
            centered,
            visible,
            offset_px: Some(offset),
            confidence: Some(detection.confidence),
        }
    }
}

impl Default for PositionValidator {
    fn default() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, LandmarkLayout, Landmarks, Point};

    fn frame(width: u32) -> CaptureFrame {
        CaptureFrame::from_gray(vec![0u8; width as usize], width, 1).unwrap()
    }

    fn detection(nose_x: f32, confidence: f32) -> DetectionResult {
        DetectionResult {
            bbox: BoundingBox { x: nose_x - 100.0, y: 100.0, width: 200.0, height: 240.0 },
            confidence,
            landmarks: Some(Landmarks::five_point([
                (nose_x - 40.0, 180.0),
                (nose_x + 40.0, 180.0),
                (nose_x, 230.0),
                (nose_x - 30.0, 280.0),
                (nose_x + 30.0, 280.0),
            ])),
        }
    }

    #[test]
    fn test_absent_detection_is_all_false() {
        let verdict = PositionValidator::default().evaluate(&frame(1280), None);
        assert!(!verdict.positioned);
        assert!(!verdict.centered);
        assert!(!verdict.visible);
        assert!(verdict.offset_px.is_none());
    }

    #[test]
    fn test_missing_landmarks_is_all_false() {
        let mut det = detection(640.0, 0.9);
        det.landmarks = None;
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&det));
        assert_eq!(verdict, PositionVerdict::default());
    }

    #[test]
    fn test_truncated_landmarks_is_all_false() {
        let mut det = detection(640.0, 0.9);
        det.landmarks = Some(Landmarks {
            layout: LandmarkLayout::SixtyEightPoint,
            points: vec![Point::new(640.0, 200.0); 5],
        });
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&det));
        assert!(!verdict.positioned && !verdict.centered && !verdict.visible);
    }

    #[test]
    fn test_centered_and_confident_passes() {
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&detection(640.0, 0.9)));
        assert!(verdict.positioned);
        assert!(verdict.centered);
        assert!(verdict.visible);
        assert_eq!(verdict.offset_px, Some(0.0));
    }

    #[test]
    fn test_just_outside_tolerance_fails() {
        let verdict =
            PositionValidator::default().evaluate(&frame(1280), Some(&detection(640.0 + 51.0, 0.9)));
        assert!(!verdict.positioned);
        assert!(!verdict.centered);
        assert!(verdict.visible);
    }

    #[test]
    fn test_low_confidence_fails() {
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&detection(640.0, 0.4)));
        assert!(!verdict.positioned);
        assert!(verdict.centered);
        assert!(!verdict.visible);
    }

    #[test]
    fn test_offset_equal_to_tolerance_fails() {
        let validator = PositionValidator::default();
        let right = validator.evaluate(&frame(1280), Some(&detection(690.0, 0.9)));
        let left = validator.evaluate(&frame(1280), Some(&detection(590.0, 0.9)));
        assert!(!right.centered && !right.positioned);
        assert!(!left.centered && !left.positioned);
    }

    #[test]
    fn test_confidence_equal_to_threshold_fails() {
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&detection(640.0, 0.5)));
        assert!(verdict.centered);
        assert!(!verdict.visible);
        assert!(!verdict.positioned);
    }

    #[test]
    fn test_example_within_tolerance() {
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&detection(640.0, 0.8)));
        assert!(verdict.positioned);
    }

    #[test]
    fn test_example_offset_110() {
        let verdict = PositionValidator::default().evaluate(&frame(1280), Some(&detection(750.0, 0.8)));
        assert_eq!(verdict.offset_px, Some(110.0));
        assert!(!verdict.positioned);
    }

    #[test]
    fn test_wider_tolerance_accepts_larger_offset() {
        let validator = PositionValidator::new(ValidatorConfig {
            center_tolerance_px: 100.0,
            ..Default::default()
        })
        .unwrap();
        let verdict = validator.evaluate(&frame(1280), Some(&detection(720.0, 0.8)));
        assert!(verdict.positioned, "offset 80 should pass with tolerance 100");
    }

    #[test]
    fn test_odd_width_midpoint() {
        // 641 px wide: midpoint 320.5
        let verdict = PositionValidator::default().evaluate(&frame(641), Some(&detection(370.0, 0.9)));
        assert_eq!(verdict.offset_px, Some(49.5));
        assert!(verdict.centered);
    }

    #[test]
    fn test_width_only_matches_frame() {
        let validator = PositionValidator::default();
        let width = NonZeroU32::new(1280).unwrap();
        for nose_x in [640.0, 689.0, 690.0, 750.0] {
            let det = detection(nose_x, 0.8);
            assert_eq!(
                validator.evaluate_width(width, Some(&det)),
                validator.evaluate(&frame(1280), Some(&det)),
                "nose_x = {nose_x}"
            );
        }
        assert_eq!(validator.evaluate_width(width, None), PositionVerdict::default());
    }

    #[test]
    fn test_width_only_handles_huge_width() {
        let width = NonZeroU32::new(4_000_000_000).unwrap();
        let verdict = PositionValidator::default().evaluate_width(width, Some(&detection(2.0e9, 0.9)));
        assert!(verdict.positioned);
    }

    #[test]
    fn test_config_rejects_non_positive_tolerance() {
        let cfg = ValidatorConfig { center_tolerance_px: 0.0, ..Default::default() };
        assert_eq!(PositionValidator::new(cfg).unwrap_err(), ConfigError::InvalidTolerance(0.0));
    }

    #[test]
    fn test_config_rejects_threshold_above_one() {
        let cfg = ValidatorConfig { visibility_threshold: 1.5, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidThreshold(1.5)));
    }

    #[test]
    fn test_config_rejects_nan() {
        let cfg = ValidatorConfig { center_tolerance_px: f32::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = ValidatorConfig { visibility_threshold: f32::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}
