//! Frame-space geometry for decoded symbols.
//!
//! Corner points reported by a decoder are turned into a bounding region
//! (axis-aligned, or oriented along the first edge of the symbol) and the
//! bounding region is turned into an integer crop window inside the frame.

use serde::{Deserialize, Serialize};

/// A point in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Axis-aligned rectangle in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A rectangle drawn rotated by `angle` radians about its own center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedRect {
    pub rect: Rect,
    pub angle: f32,
}

impl OrientedRect {
    /// Corners in drawing order (top-left, top-right, bottom-right, bottom-left
    /// of the unrotated rectangle), rotated about the center.
    pub fn corners(&self) -> [Point; 4] {
        let c = self.rect.center();
        let (sin, cos) = self.angle.sin_cos();
        let r = &self.rect;
        [
            Point::new(r.x, r.y),
            Point::new(r.right(), r.y),
            Point::new(r.right(), r.bottom()),
            Point::new(r.x, r.bottom()),
        ]
        .map(|p| {
            let dx = p.x - c.x;
            let dy = p.y - c.y;
            Point::new(c.x + dx * cos - dy * sin, c.y + dx * sin + dy * cos)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BoundingRegion {
    Axis(Rect),
    Oriented(OrientedRect),
}

impl BoundingRegion {
    /// The unrotated rectangle. Cropping always works on this one.
    pub fn rect(&self) -> Rect {
        match self {
            BoundingRegion::Axis(rect) => *rect,
            BoundingRegion::Oriented(oriented) => oriented.rect,
        }
    }

    pub fn angle(&self) -> f32 {
        match self {
            BoundingRegion::Axis(_) => 0.0,
            BoundingRegion::Oriented(oriented) => oriented.angle,
        }
    }
}

/// Integer window inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Smallest axis-aligned rectangle holding every corner point.
/// Needs at least two points.
pub fn axis_aligned_bounds(points: &[Point]) -> Option<Rect> {
    if points.len() < 2 {
        return None;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }

    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Angle of the edge from the first to the second corner point.
pub fn orientation(points: &[Point]) -> Option<f32> {
    match points {
        [p0, p1, ..] => Some((p1.y - p0.y).atan2(p1.x - p0.x)),
        _ => None,
    }
}

/// Derive the bounding region for a set of corner points.
///
/// With `oriented` set the axis-aligned bounds are kept and tagged with the
/// angle of the first edge, so the overlay is drawn rotated about its center.
pub fn bounding_region(points: &[Point], oriented: bool) -> Option<BoundingRegion> {
    let rect = axis_aligned_bounds(points)?;
    if !oriented {
        return Some(BoundingRegion::Axis(rect));
    }

    let angle = orientation(points)?;
    Some(BoundingRegion::Oriented(OrientedRect { rect, angle }))
}

/// Expand `rect` by `padding` on every side and clamp it to the frame.
/// Returns `None` when nothing of the window is left inside the frame.
pub fn padded_crop_region(
    rect: &Rect,
    padding: u32,
    frame_width: u32,
    frame_height: u32,
) -> Option<PixelRect> {
    let pad = padding as f32;
    let x0 = (rect.x - pad).floor().max(0.0);
    let y0 = (rect.y - pad).floor().max(0.0);
    let x1 = (rect.right() + pad).ceil().min(frame_width as f32);
    let y1 = (rect.bottom() + pad).ceil().min(frame_height as f32);

    if !(x1 > x0 && y1 > y0) {
        return None;
    }

    Some(PixelRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn quad() -> Vec<Point> {
        vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 10.0),
            Point::new(50.0, 30.0),
            Point::new(10.0, 30.0),
        ]
    }

    #[test]
    fn axis_aligned_bounds_of_quad() {
        let rect = axis_aligned_bounds(&quad()).expect("bounds");
        assert_eq!(rect, Rect::new(10.0, 10.0, 40.0, 20.0));
    }

    #[test]
    fn fewer_than_two_points_has_no_region() {
        assert!(bounding_region(&[], false).is_none());
        assert!(bounding_region(&[Point::new(3.0, 4.0)], true).is_none());
    }

    #[test]
    fn two_points_give_an_orientation_line() {
        let points = [Point::new(0.0, 0.0), Point::new(0.0, 25.0)];
        let region = bounding_region(&points, true).expect("region");
        assert!((region.angle() - FRAC_PI_2).abs() < 1e-6);
        assert_eq!(region.rect(), Rect::new(0.0, 0.0, 0.0, 25.0));
    }

    #[test]
    fn oriented_region_keeps_axis_rect_and_first_edge_angle() {
        let mut points = quad();
        points.swap(0, 1);
        let region = bounding_region(&points, true).expect("region");
        assert_eq!(region.rect(), Rect::new(10.0, 10.0, 40.0, 20.0));
        // first edge runs right-to-left
        assert!((region.angle().abs() - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn rotated_corners_stay_centered() {
        let oriented = OrientedRect {
            rect: Rect::new(0.0, 0.0, 4.0, 2.0),
            angle: FRAC_PI_2,
        };
        let corners = oriented.corners();
        let cx = corners.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let cy = corners.iter().map(|p| p.y).sum::<f32>() / 4.0;
        assert!((cx - 2.0).abs() < 1e-5);
        assert!((cy - 1.0).abs() < 1e-5);
        // a quarter turn swaps the extents
        assert!((corners[0].x - 3.0).abs() < 1e-5);
        assert!((corners[0].y - -1.0).abs() < 1e-5);
    }

    #[test]
    fn crop_region_is_clamped_at_origin() {
        let window = padded_crop_region(&Rect::new(0.0, 0.0, 20.0, 20.0), 50, 640, 480);
        assert_eq!(
            window,
            Some(PixelRect {
                x: 0,
                y: 0,
                width: 70,
                height: 70
            })
        );
    }

    #[test]
    fn crop_region_is_clamped_at_far_edges() {
        let window = padded_crop_region(&Rect::new(600.0, 450.0, 30.0, 20.0), 50, 640, 480)
            .expect("window");
        assert_eq!(window.x, 550);
        assert_eq!(window.y, 400);
        assert_eq!(window.width, 90);
        assert_eq!(window.height, 80);
    }

    #[test]
    fn crop_region_outside_frame_is_none() {
        assert!(padded_crop_region(&Rect::new(900.0, 900.0, 10.0, 10.0), 50, 640, 480).is_none());
        assert!(padded_crop_region(&Rect::new(0.0, 0.0, 0.0, 0.0), 0, 640, 480).is_none());
    }
}
