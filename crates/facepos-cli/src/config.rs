use facepos_core::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Validator(#[from] facepos_core::ConfigError),
}

/// Runtime configuration: optional TOML file, then `FACEPOS_*` overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path.
    pub camera_device: String,
    /// Directory holding `det_10g.onnx`.
    pub model_dir: PathBuf,
    /// Requested capture size; the driver may adjust it.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Frames discarded once after the camera opens (auto-exposure settling).
    pub warmup_frames: usize,
    pub validator: ValidatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: default_model_dir(),
            capture_width: 1280,
            capture_height: 720,
            warmup_frames: 4,
            validator: ValidatorConfig::default(),
        }
    }
}

/// Validator settings given on the command line; these win over the file
/// and the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub center_tolerance_px: Option<f32>,
    pub visibility_threshold: Option<f32>,
}

impl Config {
    /// Load from the file named by `FACEPOS_CONFIG` (if any), the process
    /// environment and `overrides`, then validate the result.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let base = match std::env::var_os("FACEPOS_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        base.resolve(|key| std::env::var(key).ok(), overrides)
    }

    /// Apply env then command-line overrides on top of `self` and validate.
    /// Validation runs last so a flag can correct a bad file or env value.
    pub fn resolve(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        self.apply_env(lookup);
        if let Some(tolerance) = overrides.center_tolerance_px {
            self.validator.center_tolerance_px = tolerance;
        }
        if let Some(threshold) = overrides.visibility_threshold {
            self.validator.visibility_threshold = threshold;
        }
        self.validator.validate()?;
        Ok(self)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `FACEPOS_*` variables. Unparseable values are
    /// ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(device) = lookup("FACEPOS_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        if let Some(dir) = lookup("FACEPOS_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        override_parsed(&lookup, "FACEPOS_CAPTURE_WIDTH", &mut self.capture_width);
        override_parsed(&lookup, "FACEPOS_CAPTURE_HEIGHT", &mut self.capture_height);
        override_parsed(&lookup, "FACEPOS_WARMUP_FRAMES", &mut self.warmup_frames);
        override_parsed(
            &lookup,
            "FACEPOS_CENTER_TOLERANCE_PX",
            &mut self.validator.center_tolerance_px,
        );
        override_parsed(
            &lookup,
            "FACEPOS_VISIBILITY_THRESHOLD",
            &mut self.validator.visibility_threshold,
        );
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        facepos_core::detector::model_path(&self.model_dir)
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable setting"),
    }
}

fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facepos/models")
}
