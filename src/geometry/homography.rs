use super::{Point, Quad};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Determinant floor for the transform in Hartley-normalized coordinates.
const SINGULAR_EPSILON: f64 = 1e-9;

/// Projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .map(Self::new)
    }

    /// Solve for H mapping the output rectangle `[0, width] x [0, height]`
    /// onto `quad`, corner for corner.
    pub fn rect_to_quad(width: f64, height: f64, quad: &Quad) -> Option<Self> {
        let rect = Quad::full_frame(width, height).corners();
        Self::from_4pt(&rect, &quad.corners())
    }

    /// Exact four-point solve with Hartley normalization on both sides.
    ///
    /// Returns `None` when the linear system or the resulting transform is singular.
    pub fn from_4pt(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let (src_n, t_src) = normalize_points(src)?;
        let (dst_n, t_dst) = normalize_points(dst)?;

        // Unknowns [h11 h12 h13 h21 h22 h23 h31 h32], h33 = 1
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for k in 0..4 {
            let (x, y) = (src_n[k].x, src_n[k].y);
            let (u, v) = (dst_n[k].x, dst_n[k].y);

            let r0 = 2 * k;
            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = 1.0;
            a[(r0, 6)] = -u * x;
            a[(r0, 7)] = -u * y;
            b[r0] = u;

            let r1 = r0 + 1;
            a[(r1, 3)] = x;
            a[(r1, 4)] = y;
            a[(r1, 5)] = 1.0;
            a[(r1, 6)] = -v * x;
            a[(r1, 7)] = -v * y;
            b[r1] = v;
        }

        let x = a.lu().solve(&b)?;
        let hn = Matrix3::new(
            x[0], x[1], x[2], //
            x[3], x[4], x[5], //
            x[6], x[7], 1.0,
        );
        if !hn.iter().all(|v| v.is_finite()) || hn.determinant().abs() < SINGULAR_EPSILON {
            return None;
        }

        let h = t_dst.try_inverse()? * hn * t_src;
        let s = h[(2, 2)];
        if s.abs() < f64::EPSILON || !h.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self::new(h / s))
    }
}

/// Translate to the centroid and scale so the mean distance is sqrt(2).
fn normalize_points(pts: &[Point; 4]) -> Option<([Point; 4], Matrix3<f64>)> {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;

    if mean_dist <= f64::EPSILON || !mean_dist.is_finite() {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        Point::new(v[0], v[1])
    });
    Some((out, t))
}
