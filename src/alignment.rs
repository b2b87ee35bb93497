//! Eye-landmark alignment.
//!
//! Turns the detector's normalised face-mesh landmarks into an [`OverlayPose`]:
//! the pixel-space anchor (midpoint between the eyes) and the anchor scale
//! (inter-eye distance) the glasses overlay is placed with.

use serde::{Deserialize, Serialize};

use crate::config::{Config, LandmarkIndices};
use crate::types::{FaceResults, FrameSize, LandmarkSet, Point};

/// Where the glasses go, in video-pixel space.
///
/// Either fully populated with finite values or not produced at all; `width`
/// is a distance and never negative.
///
/// Values are `f32`, like the landmarks they come from. Relative to a
/// double-precision evaluation the error stays within a few parts in 10^7,
/// i.e. below a thousandth of a pixel even on a 4K frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPose {
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

impl OverlayPose {
    pub fn anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite()
    }
}

/// Compute the overlay pose from the landmarks at `indices`.
///
/// Returns `None` when either eye landmark is missing (empty mesh, face lost,
/// truncated topology) or carries non-finite coordinates. That is an ordinary
/// per-frame outcome, not an error.
pub fn compute_overlay_pose(
    landmarks: &LandmarkSet,
    indices: LandmarkIndices,
    frame: FrameSize,
) -> Option<OverlayPose> {
    let left = landmarks.get(indices.left_eye)?;
    let right = landmarks.get(indices.right_eye)?;
    if !left.is_finite() || !right.is_finite() {
        return None;
    }

    let width = frame.width as f32;
    let height = frame.height as f32;

    let pose = OverlayPose {
        x: (left.x + right.x) / 2.0 * width,
        y: (left.y + right.y) / 2.0 * height,
        width: ((right.x - left.x) * width).hypot((right.y - left.y) * height),
    };

    pose.is_finite().then_some(pose)
}

/// [`compute_overlay_pose`] bound to a frame size and landmark topology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimator {
    frame: FrameSize,
    indices: LandmarkIndices,
}

impl PoseEstimator {
    pub fn new(frame: FrameSize, indices: LandmarkIndices) -> Self {
        Self { frame, indices }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.frame, config.landmarks)
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    pub fn estimate(&self, landmarks: &LandmarkSet) -> Option<OverlayPose> {
        compute_overlay_pose(landmarks, self.indices, self.frame)
    }

    /// Pose for the first face of a detector result, if any.
    pub fn estimate_results(&self, results: &FaceResults) -> Option<OverlayPose> {
        results.primary().and_then(|face| self.estimate(face))
    }
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self::new(FrameSize::default(), LandmarkIndices::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;
    use approx::assert_relative_eq;

    fn mesh_with_eyes(left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
        let mut points = vec![Landmark::new(0.5, 0.5); 478];
        points[33] = Landmark::new(left.0, left.1);
        points[263] = Landmark::new(right.0, right.1);
        LandmarkSet::new(points)
    }

    #[test]
    fn level_eyes_at_frame_center() {
        let mesh = mesh_with_eyes((0.40, 0.50), (0.60, 0.50));
        let pose = PoseEstimator::default().estimate(&mesh).unwrap();

        assert_relative_eq!(pose.x, 320.0, epsilon = 1e-3);
        assert_relative_eq!(pose.y, 240.0, epsilon = 1e-3);
        assert_relative_eq!(pose.width, 128.0, epsilon = 1e-3);
    }

    #[test]
    fn tilted_eyes_use_pixel_distance() {
        // 0.1 of width is 64px, 0.1 of height is 48px -> 80px apart
        let mesh = mesh_with_eyes((0.30, 0.40), (0.40, 0.50));
        let pose = PoseEstimator::default().estimate(&mesh).unwrap();

        assert_relative_eq!(pose.x, 224.0, epsilon = 1e-3);
        assert_relative_eq!(pose.y, 216.0, epsilon = 1e-3);
        assert_relative_eq!(pose.width, 80.0, epsilon = 1e-3);
    }

    #[test]
    fn missing_landmarks_yield_no_pose() {
        let estimator = PoseEstimator::default();
        assert!(estimator.estimate(&LandmarkSet::default()).is_none());

        // 68-point style mesh: index 33 exists, 263 does not
        let short = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); 68]);
        assert!(estimator.estimate(&short).is_none());
    }

    #[test]
    fn non_finite_landmarks_yield_no_pose() {
        let mesh = mesh_with_eyes((f32::NAN, 0.5), (0.6, 0.5));
        assert!(PoseEstimator::default().estimate(&mesh).is_none());
    }

    #[test]
    fn custom_topology_and_resolution() {
        let points = vec![Landmark::new(0.25, 0.5), Landmark::new(0.75, 0.5)];
        let estimator = PoseEstimator::new(
            FrameSize::new(1280, 720),
            LandmarkIndices {
                left_eye: 0,
                right_eye: 1,
            },
        );
        let pose = estimator.estimate(&LandmarkSet::new(points)).unwrap();

        assert_relative_eq!(pose.x, 640.0, epsilon = 1e-3);
        assert_relative_eq!(pose.y, 360.0, epsilon = 1e-3);
        assert_relative_eq!(pose.width, 640.0, epsilon = 1e-3);
    }

    #[test]
    fn single_precision_tracks_double_reference_at_4k() {
        let frame = FrameSize::new(3840, 2160);
        let estimator = PoseEstimator::new(frame, LandmarkIndices::default());
        let (w, h) = (f64::from(frame.width), f64::from(frame.height));

        for (left, right) in [
            ((0.001, 0.002), (0.999, 0.998)),
            ((0.9971, 0.0133), (0.9993, 0.0411)),
            ((0.123_456, 0.876_543), (0.654_321, 0.345_678)),
        ] {
            let pose = estimator.estimate(&mesh_with_eyes(left, right)).unwrap();
            let (lx, ly) = (f64::from(left.0), f64::from(left.1));
            let (rx, ry) = (f64::from(right.0), f64::from(right.1));

            assert_relative_eq!(f64::from(pose.x), (lx + rx) / 2.0 * w, max_relative = 1e-6);
            assert_relative_eq!(f64::from(pose.y), (ly + ry) / 2.0 * h, max_relative = 1e-6);
            assert_relative_eq!(
                f64::from(pose.width),
                ((rx - lx) * w).hypot((ry - ly) * h),
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn only_first_face_is_tracked() {
        let first = mesh_with_eyes((0.40, 0.50), (0.60, 0.50));
        let second = mesh_with_eyes((0.10, 0.10), (0.20, 0.10));
        let results = FaceResults {
            faces: vec![first, second],
        };
        let pose = PoseEstimator::default().estimate_results(&results).unwrap();
        assert_relative_eq!(pose.x, 320.0, epsilon = 1e-3);

        assert!(PoseEstimator::default()
            .estimate_results(&FaceResults::none())
            .is_none());
    }
}
