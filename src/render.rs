//! Software overlay renderer.
//!
//! Stands in for a real 3D engine: the glasses are a flat wireframe in model
//! units, placed with the same position and uniform scale a 3D renderer would
//! apply, projected through the orthographic [`Viewport`] and rasterised into
//! an [`RgbaImage`].

use std::f32::consts::TAU;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::pipeline::OverlayRenderer;
use crate::placement::{OverlayTransform, Placement, Viewport};
use crate::types::{Point, Vec3};

const BACKDROP: Rgba<u8> = Rgba([235, 235, 235, 255]);

/// Line segments of a glasses frame, one model unit wide.
#[derive(Debug, Clone, PartialEq)]
pub struct GlassesModel {
    pub segments: Vec<(Vec3, Vec3)>,
}

impl GlassesModel {
    const LENS_OFFSET: f32 = 0.28;
    const LENS_RADIUS: f32 = 0.17;
    const LENS_SEGMENTS: usize = 24;

    /// Two round lenses, a bridge and the start of both temples, centred on
    /// the origin and spanning x in [-0.5, 0.5].
    pub fn wireframe() -> Self {
        let mut segments = Vec::new();
        for side in [-1.0f32, 1.0] {
            let cx = side * Self::LENS_OFFSET;
            let rim = |k: usize| {
                let angle = TAU * k as f32 / Self::LENS_SEGMENTS as f32;
                Vec3::new(
                    cx + Self::LENS_RADIUS * angle.cos(),
                    Self::LENS_RADIUS * angle.sin(),
                    0.0,
                )
            };
            for k in 0..Self::LENS_SEGMENTS {
                segments.push((rim(k), rim(k + 1)));
            }
            let hinge = side * (Self::LENS_OFFSET + Self::LENS_RADIUS);
            segments.push((
                Vec3::new(hinge, 0.05, 0.0),
                Vec3::new(side * 0.5, 0.08, 0.0),
            ));
        }
        let inner = Self::LENS_OFFSET - Self::LENS_RADIUS;
        segments.push((Vec3::new(-inner, 0.04, 0.0), Vec3::new(inner, 0.04, 0.0)));
        Self { segments }
    }

    /// Model extent along x, in model units.
    pub fn width(&self) -> f32 {
        let (min, max) = self
            .segments
            .iter()
            .flat_map(|(a, b)| [a.x, b.x])
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        if min > max {
            0.0
        } else {
            max - min
        }
    }

    /// Transform every segment into frame pixels.
    pub fn project(&self, placement: &Placement, viewport: &Viewport) -> Vec<(Point, Point)> {
        let to_pixel = |v: &Vec3| {
            let scene = Vec3::new(
                placement.position.x + v.x * placement.scale,
                placement.position.y + v.y * placement.scale,
                placement.position.z + v.z * placement.scale,
            );
            viewport.scene_to_pixel(scene)
        };
        self.segments
            .iter()
            .map(|(a, b)| (to_pixel(a), to_pixel(b)))
            .collect()
    }
}

impl Default for GlassesModel {
    fn default() -> Self {
        Self::wireframe()
    }
}

/// Draw the glasses for `transform`. A hidden transform draws nothing.
pub fn draw_overlay(
    img: &mut RgbaImage,
    model: &GlassesModel,
    transform: &OverlayTransform,
    viewport: &Viewport,
    color: Rgba<u8>,
) {
    let Some(placement) = transform.placement() else {
        return;
    };
    let (width, height) = img.dimensions();
    for (a, b) in model.project(placement, viewport) {
        let Some((a, b)) = clip_segment(a, b, width, height) else {
            continue;
        };
        draw_line(
            img,
            a.x.round() as i32,
            a.y.round() as i32,
            b.x.round() as i32,
            b.y.round() as i32,
            color,
        );
    }
}

/// Keeps one composited frame: background plus the current overlay.
pub struct FrameCompositor {
    viewport: Viewport,
    model: GlassesModel,
    color: Rgba<u8>,
    show_anchor: bool,
    background: Option<Arc<RgbaImage>>,
    canvas: RgbaImage,
}

impl FrameCompositor {
    pub fn new(viewport: Viewport) -> Self {
        let width = viewport.width().max(0.0) as u32;
        let height = viewport.height().max(0.0) as u32;
        Self {
            viewport,
            model: GlassesModel::wireframe(),
            color: Rgba([20, 20, 20, 255]),
            show_anchor: false,
            background: None,
            canvas: RgbaImage::from_pixel(width, height, BACKDROP),
        }
    }

    pub fn with_color(mut self, color: Rgba<u8>) -> Self {
        self.color = color;
        self
    }

    /// Also mark the anchor point (midpoint between the eyes).
    pub fn with_anchor(mut self, show: bool) -> Self {
        self.show_anchor = show;
        self
    }

    pub fn set_background(&mut self, background: Option<Arc<RgbaImage>>) {
        self.background = background;
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    fn clear(&mut self) {
        match &self.background {
            Some(bg) if bg.dimensions() == self.canvas.dimensions() => {
                self.canvas.copy_from_slice(bg.as_raw());
            }
            _ => {
                for pixel in self.canvas.pixels_mut() {
                    *pixel = BACKDROP;
                }
            }
        }
    }
}

impl OverlayRenderer for FrameCompositor {
    fn apply(&mut self, transform: &OverlayTransform) {
        self.clear();
        draw_overlay(&mut self.canvas, &self.model, transform, &self.viewport, self.color);
        if !self.show_anchor {
            return;
        }
        if let Some(placement) = transform.placement() {
            if !self.viewport.contains(placement.position) {
                return;
            }
            let anchor = self.viewport.scene_to_pixel(placement.position);
            draw_circle(
                &mut self.canvas,
                anchor.x.round() as i32,
                anchor.y.round() as i32,
                2,
                Rgba([255, 0, 0, 255]),
            );
        }
    }
}

// Drawing helpers

fn draw_circle(img: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    let (img_w, img_h) = img.dimensions();

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                let px = cx + dx;
                let py = cy + dy;
                if px >= 0 && px < img_w as i32 && py >= 0 && py < img_h as i32 {
                    img.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

/// Liang-Barsky clip of `a`-`b` to the pixel grid of a `width` x `height`
/// image. `None` when the segment misses the image or is not finite.
fn clip_segment(a: Point, b: Point, width: u32, height: u32) -> Option<(Point, Point)> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }
    // f64 so that differences of far-apart f32 endpoints cannot overflow.
    let (x0, y0) = (f64::from(a.x), f64::from(a.y));
    let (dx, dy) = (f64::from(b.x) - x0, f64::from(b.y) - y0);
    let x_max = f64::from(width) - 1.0;
    let y_max = f64::from(height) - 1.0;

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x0), (dx, x_max - x0), (-dy, y0), (dy, y_max - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    let at = |t: f64| Point::new((x0 + t * dx) as f32, (y0 + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Bresenham line, clipped to the image.
fn draw_line(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (img_w, img_h) = img.dimensions();

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        if x >= 0 && x < img_w as i32 && y >= 0 && y < img_h as i32 {
            img.put_pixel(x as u32, y as u32, color);
        }

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::OverlayPose;
    use crate::placement::place_overlay;
    use crate::types::FrameSize;
    use approx::assert_relative_eq;

    const INK: Rgba<u8> = Rgba([255, 0, 255, 255]);

    fn ink_pixels(img: &RgbaImage) -> Vec<(u32, u32)> {
        img.enumerate_pixels()
            .filter(|(_, _, p)| **p == INK)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn wireframe_is_one_unit_wide() {
        assert_relative_eq!(GlassesModel::wireframe().width(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn overlay_spans_scaled_width_around_anchor() {
        let frame = FrameSize::default();
        let viewport = Viewport::for_frame(frame);
        let pose = OverlayPose {
            x: 200.0,
            y: 300.0,
            width: 100.0,
        };
        let transform = OverlayTransform::Visible(place_overlay(&pose, frame, 1.2));

        let mut img = RgbaImage::new(frame.width, frame.height);
        draw_overlay(&mut img, &GlassesModel::wireframe(), &transform, &viewport, INK);

        let pixels = ink_pixels(&img);
        assert!(!pixels.is_empty());
        let min_x = pixels.iter().map(|p| p.0).min().unwrap();
        let max_x = pixels.iter().map(|p| p.0).max().unwrap();
        // 100px eyes * 1.2 = 120px wide, centred on x = 200
        assert!((139..=141).contains(&min_x), "min_x = {min_x}");
        assert!((259..=261).contains(&max_x), "max_x = {max_x}");
        assert!(pixels.iter().all(|p| p.1 > 250 && p.1 < 350));
    }

    #[test]
    fn hidden_overlay_draws_nothing() {
        let viewport = Viewport::default();
        let mut img = RgbaImage::new(640, 480);
        draw_overlay(&mut img, &GlassesModel::wireframe(), &OverlayTransform::Hidden, &viewport, INK);
        assert!(ink_pixels(&img).is_empty());
    }

    #[test]
    fn compositor_clears_stale_overlay() {
        let frame = FrameSize::default();
        let mut compositor = FrameCompositor::new(Viewport::for_frame(frame)).with_color(INK);

        let pose = OverlayPose {
            x: 320.0,
            y: 240.0,
            width: 128.0,
        };
        compositor.apply(&OverlayTransform::Visible(place_overlay(&pose, frame, 1.2)));
        assert!(!ink_pixels(compositor.canvas()).is_empty());

        compositor.apply(&OverlayTransform::Hidden);
        assert!(ink_pixels(compositor.canvas()).is_empty());
    }

    #[test]
    fn compositor_uses_background() {
        let frame = FrameSize::new(8, 6);
        let mut compositor = FrameCompositor::new(Viewport::for_frame(frame));
        let bg = RgbaImage::from_pixel(8, 6, Rgba([1, 2, 3, 255]));
        compositor.set_background(Some(Arc::new(bg.clone())));
        compositor.apply(&OverlayTransform::Hidden);
        assert_eq!(compositor.canvas(), &bg);
    }

    #[test]
    fn oversized_overlay_is_clipped_to_canvas() {
        let frame = FrameSize::default();
        let viewport = Viewport::for_frame(frame);
        // Eyes at x = -2e6 and 2e6 of the frame width.
        let pose = OverlayPose {
            x: 320.0,
            y: 240.0,
            width: 2.56e9,
        };
        let transform = OverlayTransform::Visible(place_overlay(&pose, frame, 1.2));

        let mut img = RgbaImage::new(frame.width, frame.height);
        draw_overlay(&mut img, &GlassesModel::wireframe(), &transform, &viewport, INK);
        assert!(ink_pixels(&img).len() < (frame.width * frame.height) as usize);

        let far = OverlayPose {
            x: 1.0e30,
            y: -1.0e30,
            width: 1.0e30,
        };
        let transform = OverlayTransform::Visible(place_overlay(&far, frame, 1.2));
        let mut compositor = FrameCompositor::new(viewport).with_color(INK).with_anchor(true);
        compositor.apply(&transform);
        assert!(ink_pixels(compositor.canvas()).is_empty());
    }

    #[test]
    fn segment_clipping() {
        let inside = (Point::new(1.0, 1.0), Point::new(5.0, 5.0));
        assert_eq!(clip_segment(inside.0, inside.1, 10, 10), Some(inside));

        let (a, b) = clip_segment(Point::new(-1.0e9, 4.0), Point::new(1.0e9, 4.0), 10, 10).unwrap();
        assert_relative_eq!(a.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(b.x, 9.0, epsilon = 1e-3);
        assert_relative_eq!(a.y, 4.0);

        assert!(clip_segment(Point::new(-5.0, -5.0), Point::new(-1.0, 20.0), 10, 10).is_none());
        assert!(clip_segment(Point::new(f32::NAN, 0.0), Point::new(1.0, 1.0), 10, 10).is_none());
        assert!(clip_segment(Point::new(-f32::MAX, 2.0), Point::new(f32::MAX, 2.0), 10, 10).is_some());
    }

    #[test]
    fn line_is_clipped_to_image() {
        let mut img = RgbaImage::new(10, 10);
        draw_line(&mut img, -5, 5, 20, 5, INK);
        assert_eq!(ink_pixels(&img).len(), 10);
    }
}
