//! Render-time mapping from pixel space into the overlay scene.
//!
//! The scene is viewed by a fixed orthographic camera whose bounds match the
//! capture resolution, so one scene unit is one video pixel. Only the origin
//! moves (to the frame centre) and the y axis flips to point up.

use serde::{Deserialize, Serialize};

use crate::alignment::OverlayPose;
use crate::types::{FrameSize, Point, Vec3};

/// Position and uniform scale for the glasses object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vec3,
    pub scale: f32,
}

/// What the renderer should do with the overlay this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OverlayTransform {
    /// No face: the overlay is not drawn at all.
    Hidden,
    Visible(Placement),
}

impl OverlayTransform {
    pub fn from_pose(pose: Option<OverlayPose>, frame: FrameSize, scale_factor: f32) -> Self {
        match pose {
            Some(pose) => Self::Visible(place_overlay(&pose, frame, scale_factor)),
            None => Self::Hidden,
        }
    }

    pub fn placement(&self) -> Option<&Placement> {
        match self {
            Self::Visible(placement) => Some(placement),
            Self::Hidden => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible(_))
    }
}

/// Map a pixel-space pose into scene coordinates.
pub fn place_overlay(pose: &OverlayPose, frame: FrameSize, scale_factor: f32) -> Placement {
    let center = frame.center();
    Placement {
        position: Vec3::new(pose.x - center.x, -(pose.y - center.y), 0.0),
        scale: pose.width * scale_factor,
    }
}

/// Orthographic camera bounds for the overlay scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: Vec3,
}

impl Viewport {
    const NEAR: f32 = -100.0;
    const FAR: f32 = 1000.0;
    const CAMERA_Z: f32 = 10.0;

    /// Bounds of ±width/2 by ±height/2, so pixels and scene units align 1:1.
    pub fn for_frame(frame: FrameSize) -> Self {
        let half_w = frame.width as f32 / 2.0;
        let half_h = frame.height as f32 / 2.0;
        Self {
            left: -half_w,
            right: half_w,
            top: half_h,
            bottom: -half_h,
            near: Self::NEAR,
            far: Self::FAR,
            camera_position: Vec3::new(0.0, 0.0, Self::CAMERA_Z),
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Project a scene point back onto the video frame (top-left origin).
    pub fn scene_to_pixel(&self, point: Vec3) -> Point {
        Point::new(point.x - self.left, self.top - point.y)
    }

    /// Whether `point` lies inside the view volume.
    pub fn contains(&self, point: Vec3) -> bool {
        let depth = self.camera_position.z - point.z;
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.bottom
            && point.y <= self.top
            && depth >= self.near
            && depth <= self.far
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::for_frame(FrameSize::default())
    }
}
