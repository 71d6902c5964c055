//! Quadrilateral value type and the statistics the stability filter needs.
//!
//! All coordinates are pixels in a single frame, origin top-left, y down.

pub mod homography;

pub use homography::Homography;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

pub type Point = Point2<f64>;

/// Relative triangle area below which three corners count as collinear.
const COLLINEAR_EPSILON: f64 = 1e-6;

/// Four ordered corners of a detected document.
///
/// Winding is always top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

/// Axis-aligned bounds of a quad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Quad {
    pub fn new(top_left: Point, top_right: Point, bottom_right: Point, bottom_left: Point) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Build from `[x, y]` pairs in top-left, top-right, bottom-right, bottom-left order.
    pub fn from_array(c: [[f64; 2]; 4]) -> Self {
        Self::from_corners(c.map(|[x, y]| Point::new(x, y)))
    }

    pub fn to_array(&self) -> [[f64; 2]; 4] {
        self.corners().map(|p| [p.x, p.y])
    }

    pub fn from_corners(c: [Point; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    /// Axis-aligned quad covering `[0, width] x [0, height]`.
    pub fn full_frame(width: f64, height: f64) -> Self {
        Self::from_array([[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]])
    }

    pub fn zero() -> Self {
        Self::from_corners([Point::origin(); 4])
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    fn map_corners(&self, f: impl Fn(Point) -> Point) -> Self {
        Self::from_corners(self.corners().map(f))
    }

    /// Convert a unit-normalized, bottom-left-origin quad into top-left-origin pixels.
    pub fn from_normalized(normalized: &Quad, width: f64, height: f64) -> Self {
        normalized.map_corners(|p| Point::new(p.x * width, (1.0 - p.y) * height))
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        self.map_corners(|p| Point::new(p.x * sx, p.y * sy))
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        self.map_corners(|p| Point::new(p.x + dx, p.y + dy))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let c = self.corners();
        let min_x = c.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = c.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = c.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = c.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Longest horizontal edge and longest vertical edge.
    pub fn edge_extent(&self) -> (f64, f64) {
        let top = nalgebra::distance(&self.top_left, &self.top_right);
        let bottom = nalgebra::distance(&self.bottom_left, &self.bottom_right);
        let left = nalgebra::distance(&self.top_left, &self.bottom_left);
        let right = nalgebra::distance(&self.top_right, &self.bottom_right);
        (top.max(bottom), left.max(right))
    }

    /// Short side over long side, in `[0, 1]`. Zero for a collapsed quad.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = self.edge_extent();
        let long = w.max(h);
        if long <= 0.0 || !long.is_finite() {
            return 0.0;
        }
        w.min(h) / long
    }

    /// True when any three corners are collinear (or coordinates are not finite).
    pub fn is_degenerate(&self) -> bool {
        let c = self.corners();
        if c.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return true;
        }

        let bb = self.bounding_box();
        let scale = bb.width.max(bb.height);
        if scale <= f64::EPSILON {
            return true;
        }

        let min_area = COLLINEAR_EPSILON * scale * scale;
        (0..4).any(|skip| {
            let t: Vec<Point> = (0..4).filter(|&i| i != skip).map(|i| c[i]).collect();
            triangle_area(t[0], t[1], t[2]) <= min_area
        })
    }

    /// Sum of Euclidean distances between corresponding corners.
    pub fn corner_distance(&self, other: &Quad) -> f64 {
        self.corners()
            .iter()
            .zip(other.corners().iter())
            .map(|(a, b)| nalgebra::distance(a, b))
            .sum()
    }

    /// Componentwise arithmetic mean. The mean of nothing is the zero quad.
    pub fn mean(samples: &[Quad]) -> Quad {
        if samples.is_empty() {
            return Quad::zero();
        }
        let n = samples.len() as f64;
        let mut sums = [Vector2::<f64>::zeros(); 4];
        for q in samples {
            for (sum, p) in sums.iter_mut().zip(q.corners().iter()) {
                *sum += p.coords;
            }
        }
        Quad::from_corners(sums.map(|s| Point::from(s / n)))
    }

    /// Median taken independently per coordinate (not a geometric median).
    pub fn median(samples: &[Quad]) -> Quad {
        if samples.is_empty() {
            return Quad::zero();
        }
        let mut corners = [Point::origin(); 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            let xs: Vec<f64> = samples.iter().map(|q| q.corners()[i].x).collect();
            let ys: Vec<f64> = samples.iter().map(|q| q.corners()[i].y).collect();
            *corner = Point::new(median_of(xs), median_of(ys));
        }
        Quad::from_corners(corners)
    }

    /// Mean over samples of [`Quad::corner_distance`] to `reference`.
    pub fn dispersion(samples: &[Quad], reference: &Quad) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let total: f64 = samples.iter().map(|q| q.corner_distance(reference)).sum();
        total / samples.len() as f64
    }
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    let ab = b - a;
    let ac = c - a;
    (ab.x * ac.y - ab.y * ac.x).abs() * 0.5
}

fn median_of(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(offset: f64) -> Quad {
        Quad::from_array([[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]])
            .translated(offset, offset)
    }

    #[test]
    fn test_mean_of_empty_is_zero() {
        assert_eq!(Quad::mean(&[]), Quad::zero());
        assert_eq!(Quad::median(&[]), Quad::zero());
        assert_eq!(Quad::dispersion(&[], &square(0.0)), 0.0);
    }

    #[test]
    fn test_mean_and_median() {
        let samples = [square(0.0), square(1.0), square(5.0)];
        let mean = Quad::mean(&samples);
        assert_relative_eq!(mean.top_left.x, 2.0);
        assert_relative_eq!(mean.bottom_right.y, 12.0);

        let median = Quad::median(&samples);
        assert_eq!(median, square(1.0));
    }

    #[test]
    fn test_median_even_count_averages_middle_pair() {
        let samples = [square(0.0), square(2.0), square(4.0), square(10.0)];
        assert_eq!(Quad::median(&samples), square(3.0));
    }

    #[test]
    fn test_dispersion_sums_corner_distances() {
        let reference = square(0.0);
        let shifted = reference.translated(3.0, 4.0);
        // 5px per corner, 4 corners
        assert_relative_eq!(Quad::dispersion(&[shifted], &reference), 20.0);
        assert_relative_eq!(Quad::dispersion(&[shifted, reference], &reference), 10.0);
    }

    #[test]
    fn test_normalized_conversion_flips_y() {
        let normalized = Quad::from_array([[0.1, 0.9], [0.9, 0.9], [0.9, 0.1], [0.1, 0.1]]);
        let px = Quad::from_normalized(&normalized, 1000.0, 500.0);
        assert_relative_eq!(px.top_left.x, 100.0);
        assert_relative_eq!(px.top_left.y, 50.0, epsilon = 1e-9);
        assert_relative_eq!(px.bottom_right.x, 900.0);
        assert_relative_eq!(px.bottom_right.y, 450.0, epsilon = 1e-9);
    }

    #[test]
    fn test_aspect_ratio_and_extent() {
        let q = Quad::from_array([[0.0, 0.0], [200.0, 0.0], [200.0, 100.0], [0.0, 100.0]]);
        assert_eq!(q.edge_extent(), (200.0, 100.0));
        assert_relative_eq!(q.aspect_ratio(), 0.5);
        assert_eq!(Quad::zero().aspect_ratio(), 0.0);
    }

    #[test]
    fn test_degenerate_detection() {
        assert!(!square(0.0).is_degenerate());
        assert!(Quad::zero().is_degenerate());

        let collinear = Quad::from_array([[0.0, 0.0], [5.0, 0.0], [10.0, 0.0], [0.0, 10.0]]);
        assert!(collinear.is_degenerate());

        let nan = Quad::from_array([[f64::NAN, 0.0], [5.0, 0.0], [10.0, 5.0], [0.0, 10.0]]);
        assert!(nan.is_degenerate());
    }

    #[test]
    fn test_bounding_box() {
        let q = Quad::from_array([[10.0, 20.0], [110.0, 15.0], [120.0, 90.0], [5.0, 95.0]]);
        let bb = q.bounding_box();
        assert_eq!(bb.x, 5.0);
        assert_eq!(bb.y, 15.0);
        assert_eq!(bb.width, 115.0);
        assert_eq!(bb.height, 80.0);
    }

    #[test]
    fn test_serializes_points_as_pairs() {
        let json = serde_json::to_string(&square(0.0)).unwrap();
        assert!(json.contains("\"top_left\":[0.0,0.0]"));
        let back: Quad = serde_json::from_str(&json).unwrap();
        assert_eq!(back, square(0.0));
    }
}
