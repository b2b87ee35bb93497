//! # glasses-tryon
//!
//! Alignment core for virtual glasses try-on.
//!
//! A face-mesh detector reports normalised landmarks for every camera frame.
//! This crate turns the two eye reference points of that mesh into an
//! [`OverlayPose`] (anchor and scale in video pixels), publishes it through a
//! [`PoseCell`], and maps it into the orthographic scene a renderer draws the
//! glasses in.
//!
//! ## Pipeline
//!
//! 1. A [`FrameSource`] (camera) produces frames at the configured resolution
//! 2. A [`LandmarkDetector`] turns each frame into [`FaceResults`]
//! 3. The [`Tracker`] computes the pose of the first face (or none) and
//!    notifies its [`PoseObserver`]s, usually a shared [`PoseCell`]
//! 4. A [`RenderLoop`] reads the cell once per display frame and produces an
//!    [`OverlayTransform`]: hidden, or visible at a [`Placement`]
//!
//! Steps 1–3 usually run on a [`TrackingWorker`] thread while step 4 runs at
//! the display rate. The two only share the cell.
//!
//! ## Quick Start
//!
//! ```rust
//! use glasses_tryon::{
//!     place_overlay, Config, FaceResults, Landmark, LandmarkSet, PoseEstimator,
//! };
//!
//! let config = Config::default();
//! let estimator = PoseEstimator::from_config(&config);
//!
//! let mut points = vec![Landmark::new(0.5, 0.5); 478];
//! points[33] = Landmark::new(0.40, 0.50);
//! points[263] = Landmark::new(0.60, 0.50);
//! let results = FaceResults::single(LandmarkSet::new(points));
//!
//! let pose = estimator.estimate_results(&results).expect("face in frame");
//! assert!((pose.width - 128.0).abs() < 1e-3);
//!
//! let placement = place_overlay(&pose, config.frame, config.overlay.scale_factor);
//! assert!(placement.position.x.abs() < 1e-3 && placement.position.y.abs() < 1e-3);
//! assert!((placement.scale - 153.6).abs() < 1e-3);
//! ```

mod alignment;
mod config;
mod error;
mod pipeline;
mod placement;
pub mod recording;
pub mod render;
mod smoothing;
mod state;
pub mod telemetry;
mod types;
mod worker;

pub use alignment::{compute_overlay_pose, OverlayPose, PoseEstimator};
pub use config::{
    Config, DetectorOptions, LandmarkIndices, OverlayConfig, DEFAULT_SCALE_FACTOR,
    LEFT_EYE_INDEX, RIGHT_EYE_INDEX,
};
pub use error::{Error, Result};
pub use pipeline::{
    Frame, FrameSource, LandmarkDetector, OverlayRenderer, PoseObserver, RenderLoop, RenderTick,
    SharedObserver, Tracker,
};
pub use placement::{place_overlay, OverlayTransform, Placement, Viewport};
pub use smoothing::PoseSmoother;
pub use state::{PoseCell, PoseSnapshot};
pub use types::{FaceResults, FrameSize, Landmark, LandmarkSet, Point, Vec3};
pub use worker::{FrameOutcome, TrackingWorker};
