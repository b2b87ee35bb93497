use std::fmt;

use serde::{Deserialize, Serialize};

/// A 2D point in pixel space (origin top-left, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// A point in scene space (origin at the viewport centre, y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Pixel dimensions of the video frame.
///
/// The capture source, the detector and the alignment transform must all agree
/// on this value, otherwise normalised landmarks map to the wrong pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    /// Convert a normalised [0,1] landmark position into pixel coordinates.
    pub fn denormalize(&self, landmark: &Landmark) -> Point {
        Point::new(
            landmark.x * self.width as f32,
            landmark.y * self.height as f32,
        )
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A facial keypoint produced by the detector, normalised to the frame.
///
/// `z` is the detector's relative depth estimate. It is carried along but the
/// alignment only looks at `x` and `y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub const fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// All landmarks the detector reported for one face, indexed by mesh topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Landmark> {
        self.points.get(idx)
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}

/// One detector result: zero or more faces, in detector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceResults {
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
}

impl FaceResults {
    pub fn none() -> Self {
        Self { faces: Vec::new() }
    }

    pub fn single(face: LandmarkSet) -> Self {
        Self { faces: vec![face] }
    }

    /// The tracked face. Only the first face is ever used.
    pub fn primary(&self) -> Option<&LandmarkSet> {
        self.faces.first()
    }
}
