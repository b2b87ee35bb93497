use crate::alignment::OverlayPose;

/// Exponential smoothing of successive poses to damp landmark jitter.
///
/// `alpha = 1.0` passes poses through untouched; smaller values weight the
/// history more. Losing the face resets the filter so a re-acquired face
/// starts from its own position instead of sliding in from the old one.
#[derive(Debug, Clone)]
pub struct PoseSmoother {
    alpha: f32,
    state: Option<OverlayPose>,
}

impl PoseSmoother {
    /// `alpha` is clamped to (0, 1]. A non-finite `alpha` turns smoothing off
    /// (`1.0`).
    pub fn new(alpha: f32) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(f32::EPSILON, 1.0)
        } else {
            1.0
        };
        Self { alpha, state: None }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn update(&mut self, pose: Option<OverlayPose>) -> Option<OverlayPose> {
        let Some(pose) = pose else {
            self.state = None;
            return None;
        };

        let next = match self.state {
            Some(prev) => OverlayPose {
                x: lerp(prev.x, pose.x, self.alpha),
                y: lerp(prev.y, pose.y, self.alpha),
                width: lerp(prev.width, pose.width, self.alpha),
            },
            None => pose,
        };
        if !next.is_finite() {
            self.state = None;
            return None;
        }
        self.state = Some(next);
        Some(next)
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
