//! Recorded landmark sessions.
//!
//! A recording is the detector output for a run of frames, stored as JSON:
//!
//! ```json
//! { "frame": { "width": 640, "height": 480 },
//!   "frames": [ { "faces": [ [ { "x": 0.41, "y": 0.52, "z": -0.01 }, ... ] ] },
//!               { "faces": [] } ] }
//! ```
//!
//! Replaying one through [`RecordedDetector`] exercises the whole pipeline
//! without a camera or a face-mesh model.

use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::{LEFT_EYE_INDEX, RIGHT_EYE_INDEX};
use crate::error::{Error, Result};
use crate::pipeline::{Frame, FrameSource, LandmarkDetector};
use crate::types::{FaceResults, FrameSize, Landmark, LandmarkSet};

/// Point count of a refined face mesh (468 + 10 iris points).
pub const REFINED_MESH_POINTS: usize = 478;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub frame: FrameSize,
    pub frames: Vec<FaceResults>,
}

impl Recording {
    pub fn new(frame: FrameSize, frames: Vec<FaceResults>) -> Self {
        Self { frame, frames }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let recording: Self = serde_json::from_reader(BufReader::new(file))?;
        recording.validate()?;
        Ok(recording)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(Error::InvalidRecording(format!(
                "frame size must be non-zero, got {}",
                self.frame
            )));
        }
        if self.frames.is_empty() {
            return Err(Error::InvalidRecording("recording has no frames".into()));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// A face sweeping across the frame, turning slightly and moving closer
    /// and further away. The face is lost for ten frames out of every ninety.
    pub fn synthetic(num_frames: usize, frame: FrameSize) -> Self {
        let frames = (0..num_frames)
            .map(|i| {
                if i % 90 >= 80 {
                    return FaceResults::none();
                }
                let t = i as f32 / 120.0;
                let face = SyntheticFace {
                    center_x: 0.5 + 0.22 * (TAU * t).sin(),
                    center_y: 0.48 + 0.08 * (TAU * t * 2.0).cos(),
                    eye_spacing: 0.2 + 0.05 * (TAU * t * 0.5).sin(),
                    roll: 0.15 * (TAU * t * 1.5).sin(),
                };
                FaceResults::single(face.mesh(frame))
            })
            .collect();
        Self { frame, frames }
    }
}

struct SyntheticFace {
    center_x: f32,
    center_y: f32,
    /// Inter-eye distance as a fraction of frame width.
    eye_spacing: f32,
    /// Head roll in radians.
    roll: f32,
}

impl SyntheticFace {
    fn mesh(&self, frame: FrameSize) -> LandmarkSet {
        let aspect = frame.width as f32 / frame.height as f32;
        let (sin, cos) = self.roll.sin_cos();
        // Offsets are in width-normalised units; y is rescaled so the face
        // keeps its shape on non-square frames.
        let at = |dx: f32, dy: f32| {
            let rx = dx * cos - dy * sin;
            let ry = dx * sin + dy * cos;
            Landmark::new(self.center_x + rx, self.center_y + ry * aspect)
        };

        let half = self.eye_spacing / 2.0;
        let mut points: Vec<Landmark> = (0..REFINED_MESH_POINTS)
            .map(|k| {
                let angle = TAU * k as f32 / REFINED_MESH_POINTS as f32;
                let ring = 0.3 + 0.7 * ((k % 7) as f32 / 6.0);
                at(
                    angle.cos() * half * 1.6 * ring,
                    angle.sin() * half * 2.1 * ring,
                )
            })
            .collect();
        points[LEFT_EYE_INDEX] = at(-half, 0.0);
        points[RIGHT_EYE_INDEX] = at(half, 0.0);
        LandmarkSet::new(points)
    }
}

/// Replays a recording, one entry per frame sequence number.
#[derive(Debug, Clone)]
pub struct RecordedDetector {
    recording: Arc<Recording>,
}

impl RecordedDetector {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self { recording }
    }
}

impl LandmarkDetector for RecordedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<FaceResults> {
        usize::try_from(frame.sequence)
            .ok()
            .and_then(|idx| self.recording.frames.get(idx))
            .cloned()
            .ok_or_else(|| {
                Error::Detector(format!(
                    "frame {} is past the end of the recording ({} frames)",
                    frame.sequence,
                    self.recording.len()
                ))
            })
    }
}

/// Frame source producing frames of a fixed size, optionally all showing the
/// same background image.
#[derive(Debug, Clone)]
pub struct BlankCamera {
    size: FrameSize,
    limit: Option<u64>,
    background: Option<Arc<RgbaImage>>,
    next: u64,
}

impl BlankCamera {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            limit: None,
            background: None,
            next: 0,
        }
    }

    /// Stop after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Use `background` for every frame. It must match the camera size.
    pub fn with_background(mut self, background: RgbaImage) -> Result<Self> {
        let (width, height) = background.dimensions();
        let actual = FrameSize::new(width, height);
        if actual != self.size {
            return Err(Error::FrameSizeMismatch {
                expected: self.size,
                actual,
            });
        }
        self.background = Some(Arc::new(background));
        Ok(self)
    }
}

impl FrameSource for BlankCamera {
    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.limit.is_some_and(|limit| self.next >= limit) {
            return None;
        }
        let frame = Frame {
            sequence: self.next,
            size: self.size,
            image: self.background.clone(),
        };
        self.next += 1;
        Some(frame)
    }
}
