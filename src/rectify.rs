//! Perspective rectification of a detected document.

use crate::config::RectifyConfig;
use crate::errors::RectifyError;
use crate::geometry::{Homography, Point, Quad};
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};

/// A flattened document crop.
#[derive(Debug, Clone)]
pub struct RectifiedImage {
    pub image: RgbaImage,
    /// Source-image quad the crop was taken from.
    pub quad: Quad,
    /// Output pixel coordinates to source pixel coordinates.
    pub homography: Homography,
}

impl RectifiedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// What the consumer receives for one capture.
#[derive(Debug, Clone)]
pub enum DocumentImage {
    Rectified(RectifiedImage),
    /// Rectification was not possible; the still is passed through untouched.
    Original {
        image: DynamicImage,
        reason: RectifyError,
    },
}

impl DocumentImage {
    pub fn is_rectified(&self) -> bool {
        matches!(self, DocumentImage::Rectified(_))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DocumentImage::Rectified(r) => r.image.dimensions(),
            DocumentImage::Original { image, .. } => (image.width(), image.height()),
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            DocumentImage::Rectified(r) => DynamicImage::ImageRgba8(r.image),
            DocumentImage::Original { image, .. } => image,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerspectiveRectifier {
    max_output_side: u32,
}

impl PerspectiveRectifier {
    pub fn new(max_output_side: u32) -> Self {
        Self {
            max_output_side: max_output_side.max(1),
        }
    }

    pub fn from_config(config: &RectifyConfig) -> Self {
        Self::new(config.max_output_side)
    }

    /// Output size for `quad`: longest horizontal edge by longest vertical edge.
    pub fn output_size(&self, quad: &Quad) -> Result<(u32, u32), RectifyError> {
        if quad.is_degenerate() {
            return Err(RectifyError::DegenerateQuad);
        }
        let (w, h) = quad.edge_extent();
        let (w, h) = (w.round().max(1.0), h.round().max(1.0));
        let max = self.max_output_side;
        if w > max as f64 || h > max as f64 {
            return Err(RectifyError::OutputTooLarge {
                width: w.min(u32::MAX as f64) as u32,
                height: h.min(u32::MAX as f64) as u32,
                max,
            });
        }
        Ok((w as u32, h as u32))
    }

    /// Warp the region inside `quad` (source pixels, top-left origin) to an upright rectangle.
    pub fn rectify(
        &self,
        source: &DynamicImage,
        quad: &Quad,
    ) -> Result<RectifiedImage, RectifyError> {
        if source.width() == 0 || source.height() == 0 {
            return Err(RectifyError::EmptyImage);
        }
        let (width, height) = self.output_size(quad)?;
        let homography = Homography::rect_to_quad(width as f64, height as f64, quad)
            .ok_or(RectifyError::NonInvertible)?;

        let src = source.to_rgba8();
        let image = ImageBuffer::from_fn(width, height, |x, y| {
            // Pixel centres map to pixel centres.
            let p = homography.apply(Point::new(x as f64 + 0.5, y as f64 + 0.5));
            sample_bilinear(&src, p.x - 0.5, p.y - 0.5)
        });

        log::debug!(
            "Rectified {}x{} source to {}x{}",
            source.width(),
            source.height(),
            width,
            height
        );

        Ok(RectifiedImage {
            image,
            quad: *quad,
            homography,
        })
    }

    /// Rectify, falling back to the unmodified source on failure.
    pub fn rectify_or_original(&self, source: DynamicImage, quad: &Quad) -> DocumentImage {
        match self.rectify(&source, quad) {
            Ok(rectified) => DocumentImage::Rectified(rectified),
            Err(reason) => {
                log::warn!("Rectification failed, using original image: {}", reason);
                DocumentImage::Original {
                    image: source,
                    reason,
                }
            }
        }
    }
}

impl Default for PerspectiveRectifier {
    fn default() -> Self {
        Self::from_config(&RectifyConfig::default())
    }
}

/// Bilinear sample with coordinates clamped to the image edge.
#[inline]
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let max_x = (src.width() - 1) as f64;
    let max_y = (src.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let a = p00[c] as f64 + fx * (p10[c] as f64 - p00[c] as f64);
        let b = p01[c] as f64 + fx * (p11[c] as f64 - p01[c] as f64);
        out[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            let v = if (x / 4 + y / 4) % 2 == 0 { 230 } else { 20 };
            Rgba([v, (x * 7 % 256) as u8, (y * 5 % 256) as u8, 255])
        }))
    }

    #[test]
    fn test_full_frame_quad_reproduces_source() {
        let source = checker(64, 48);
        let quad = Quad::full_frame(64.0, 48.0);
        let out = PerspectiveRectifier::default().rectify(&source, &quad).unwrap();
        assert_eq!(out.image.dimensions(), (64, 48));
        let src = source.to_rgba8();
        for (a, b) in out.image.pixels().zip(src.pixels()) {
            for c in 0..4 {
                assert!((a.0[c] as i16 - b.0[c] as i16).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_output_size_uses_longest_edges() {
        let quad = Quad::from_array([[10.0, 10.0], [110.0, 10.0], [120.0, 60.0], [0.0, 60.0]]);
        let size = PerspectiveRectifier::default().output_size(&quad).unwrap();
        assert_eq!(size, (120, 51));
    }

    #[test]
    fn test_degenerate_quad_falls_back() {
        let source = checker(32, 32);
        let quad = Quad::from_array([[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [0.0, 20.0]]);
        let rectifier = PerspectiveRectifier::default();
        assert_eq!(
            rectifier.rectify(&source, &quad).unwrap_err(),
            RectifyError::DegenerateQuad
        );
        match rectifier.rectify_or_original(source.clone(), &quad) {
            DocumentImage::Original { image, reason } => {
                assert_eq!(reason, RectifyError::DegenerateQuad);
                assert_eq!(image.to_rgba8(), source.to_rgba8());
            }
            DocumentImage::Rectified(_) => panic!("expected fallback"),
        }
    }

    #[test]
    fn test_empty_image_rejected() {
        let source = DynamicImage::new_rgba8(0, 0);
        let err = PerspectiveRectifier::default()
            .rectify(&source, &Quad::full_frame(10.0, 10.0))
            .unwrap_err();
        assert_eq!(err, RectifyError::EmptyImage);
    }

    #[test]
    fn test_output_limit() {
        let rectifier = PerspectiveRectifier::new(100);
        let err = rectifier
            .output_size(&Quad::full_frame(400.0, 50.0))
            .unwrap_err();
        assert_eq!(
            err,
            RectifyError::OutputTooLarge {
                width: 400,
                height: 50,
                max: 100
            }
        );
    }
}
