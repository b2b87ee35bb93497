//! Collaborator seams and the per-frame tracking step.
//!
//! ```text
//! FrameSource ──frame──▶ LandmarkDetector ──FaceResults──▶ Tracker
//!                                                           │ OverlayPose | none
//!                                                           ▼
//!                                    PoseObserver (PoseCell, callbacks)
//!                                                           │ latest()
//!                                                           ▼
//!                                      RenderLoop ──▶ OverlayRenderer
//! ```
//!
//! Camera and detector are traits so any capture or face-mesh backend can be
//! plugged in. The render side never talks to the tracker directly: it reads
//! whatever the [`PoseCell`] holds when it draws.

use std::sync::Arc;

use image::RgbaImage;

use crate::alignment::{OverlayPose, PoseEstimator};
use crate::config::{Config, DetectorOptions};
use crate::error::{Error, Result};
use crate::placement::OverlayTransform;
use crate::smoothing::PoseSmoother;
use crate::state::PoseCell;
use crate::types::{FaceResults, FrameSize};

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture order, starting at 0.
    pub sequence: u64,
    pub size: FrameSize,
    /// Pixels, when the source has them. Detectors replaying recorded
    /// landmarks do not need any.
    pub image: Option<Arc<RgbaImage>>,
}

impl Frame {
    pub fn blank(sequence: u64, size: FrameSize) -> Self {
        Self {
            sequence,
            size,
            image: None,
        }
    }
}

/// Camera side: hands out frames at a fixed resolution.
pub trait FrameSource {
    fn frame_size(&self) -> FrameSize;

    /// The next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Face-landmark detector side.
pub trait LandmarkDetector {
    /// Receive the tracking options. Detectors that have no use for them can
    /// ignore the call.
    fn set_options(&mut self, _options: &DetectorOptions) {}

    fn detect(&mut self, frame: &Frame) -> Result<FaceResults>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn set_options(&mut self, options: &DetectorOptions) {
        (**self).set_options(options)
    }

    fn detect(&mut self, frame: &Frame) -> Result<FaceResults> {
        (**self).detect(frame)
    }
}

/// Anything interested in the pose computed for each frame.
pub trait PoseObserver {
    fn on_pose(&self, pose: Option<OverlayPose>);
}

impl PoseObserver for PoseCell {
    fn on_pose(&self, pose: Option<OverlayPose>) {
        self.publish(pose);
    }
}

impl<F> PoseObserver for F
where
    F: Fn(Option<OverlayPose>),
{
    fn on_pose(&self, pose: Option<OverlayPose>) {
        self(pose)
    }
}

pub type SharedObserver = Arc<dyn PoseObserver + Send + Sync>;

/// Runs the detector on a frame and publishes the resulting pose.
pub struct Tracker<D> {
    detector: D,
    estimator: PoseEstimator,
    smoother: Option<PoseSmoother>,
    observers: Vec<SharedObserver>,
}

impl<D: LandmarkDetector> Tracker<D> {
    pub fn new(mut detector: D, config: &Config) -> Self {
        detector.set_options(&config.detector);
        Self {
            detector,
            estimator: PoseEstimator::from_config(config),
            smoother: config.overlay.smoothing.map(PoseSmoother::new),
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: SharedObserver) {
        self.observers.push(observer);
    }

    /// Convenience for the common case of one shared cell.
    pub fn with_cell(mut self, cell: Arc<PoseCell>) -> Self {
        self.subscribe(cell);
        self
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Detect landmarks on `frame` and publish the pose.
    ///
    /// Frames of the wrong size are rejected before reaching the detector.
    /// Detector failures are returned and nothing is published, so the
    /// overlay stays where it was.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Option<OverlayPose>> {
        let expected = self.estimator.frame();
        if frame.size != expected {
            return Err(Error::FrameSizeMismatch {
                expected,
                actual: frame.size,
            });
        }
        let results = self.detector.detect(frame)?;
        Ok(self.handle_results(&results))
    }

    /// Turn a detector result into a pose and notify every observer.
    pub fn handle_results(&mut self, results: &FaceResults) -> Option<OverlayPose> {
        let mut pose = self.estimator.estimate_results(results);
        if let Some(smoother) = self.smoother.as_mut() {
            pose = smoother.update(pose);
        }

        match pose {
            Some(p) => tracing::debug!(x = p.x, y = p.y, width = p.width, "pose updated"),
            None => tracing::trace!(faces = results.faces.len(), "no pose"),
        }

        for observer in &self.observers {
            observer.on_pose(pose);
        }
        pose
    }
}

/// Display side: something that can show or hide the glasses.
pub trait OverlayRenderer {
    fn apply(&mut self, transform: &OverlayTransform);
}

/// What the render loop saw on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTick {
    pub transform: OverlayTransform,
    pub generation: u64,
    /// Whether a new pose was published since the previous tick.
    pub fresh: bool,
}

/// Reads the pose cell once per rendered frame.
#[derive(Debug)]
pub struct RenderLoop {
    cell: Arc<PoseCell>,
    frame: FrameSize,
    scale_factor: f32,
    last_generation: u64,
}

impl RenderLoop {
    pub fn new(cell: Arc<PoseCell>, config: &Config) -> Self {
        Self {
            cell,
            frame: config.frame,
            scale_factor: config.overlay.scale_factor,
            last_generation: 0,
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f32) {
        self.scale_factor = scale_factor;
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn tick(&mut self) -> RenderTick {
        let snapshot = self.cell.snapshot();
        let fresh = snapshot.generation != self.last_generation;
        self.last_generation = snapshot.generation;
        RenderTick {
            transform: OverlayTransform::from_pose(snapshot.pose, self.frame, self.scale_factor),
            generation: snapshot.generation,
            fresh,
        }
    }

    /// Tick and hand the result to `renderer`.
    pub fn drive<R: OverlayRenderer + ?Sized>(&mut self, renderer: &mut R) -> RenderTick {
        let tick = self.tick();
        renderer.apply(&tick.transform);
        tick
    }
}
