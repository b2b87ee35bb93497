//! Runtime configuration for the alignment pipeline.
//!
//! Every constant the overlay depends on lives here so the same code can run
//! at other capture resolutions or against another landmark topology. Configs
//! are stored as JSON; missing sections fall back to their defaults.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::placement::Viewport;
use crate::types::FrameSize;

/// Face-mesh index of the left-eye reference point.
pub const LEFT_EYE_INDEX: usize = 33;

/// Face-mesh index of the right-eye reference point.
pub const RIGHT_EYE_INDEX: usize = 263;

/// Converts inter-eye pixel distance into the glasses model's native units.
pub const DEFAULT_SCALE_FACTOR: f32 = 1.2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub frame: FrameSize,
    pub landmarks: LandmarkIndices,
    pub overlay: OverlayConfig,
    pub detector: DetectorOptions,
}

/// Which landmarks of the mesh anchor the glasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkIndices {
    pub left_eye: usize,
    pub right_eye: usize,
}

impl Default for LandmarkIndices {
    fn default() -> Self {
        Self {
            left_eye: LEFT_EYE_INDEX,
            right_eye: RIGHT_EYE_INDEX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub scale_factor: f32,
    /// Exponential smoothing factor in (0, 1]. `None` places the overlay
    /// exactly where each frame's landmarks put it.
    pub smoothing: Option<f32>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            smoothing: None,
        }
    }
}

/// Options handed to the landmark detector as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_num_faces: u32,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_num_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "frame size must be non-zero, got {}",
                self.frame
            )));
        }
        if self.landmarks.left_eye == self.landmarks.right_eye {
            return Err(Error::InvalidConfig(format!(
                "eye landmark indices must differ, both are {}",
                self.landmarks.left_eye
            )));
        }
        let scale = self.overlay.scale_factor;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "scale factor must be a positive number, got {scale}"
            )));
        }
        if let Some(alpha) = self.overlay.smoothing {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "smoothing factor must be in (0, 1], got {alpha}"
                )));
            }
        }
        if self.detector.max_num_faces == 0 {
            return Err(Error::InvalidConfig("max_num_faces must be at least 1".into()));
        }
        for (name, value) in [
            ("min_detection_confidence", self.detector.min_detection_confidence),
            ("min_tracking_confidence", self.detector.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The orthographic camera matching the capture resolution.
    pub fn viewport(&self) -> Viewport {
        Viewport::for_frame(self.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_capture_setup() {
        let config = Config::default();
        assert_eq!(config.frame, FrameSize::new(640, 480));
        assert_eq!(config.landmarks.left_eye, 33);
        assert_eq!(config.landmarks.right_eye, 263);
        assert_eq!(config.overlay.scale_factor, 1.2);
        assert!(config.overlay.smoothing.is_none());
        assert_eq!(config.detector.max_num_faces, 1);
        assert!(config.detector.refine_landmarks);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"frame":{"width":1280,"height":720},"overlay":{"smoothing":0.4}}"#)
                .unwrap();
        assert_eq!(config.frame, FrameSize::new(1280, 720));
        assert_eq!(config.overlay.scale_factor, DEFAULT_SCALE_FACTOR);
        assert_eq!(config.overlay.smoothing, Some(0.4));
        assert_eq!(config.landmarks, LandmarkIndices::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        config.frame = FrameSize::new(0, 480);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.landmarks.right_eye = config.landmarks.left_eye;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.overlay.scale_factor = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.overlay.smoothing = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.detector.min_tracking_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tryon.json");

        let mut config = Config::default();
        config.overlay.scale_factor = 1.5;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
