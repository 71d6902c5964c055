//! Acceptance thresholds applied to raw detector candidates.

use crate::config::AcceptanceConfig;
use crate::errors::Rejection;
use crate::geometry::Quad;
use serde::{Deserialize, Serialize};

/// Coordinate convention of a detector's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinateSpace {
    /// Top-left origin, pixels.
    #[default]
    Pixel,
    /// Bottom-left origin, unit-normalized to the frame size.
    NormalizedBottomLeft,
}

/// A single detector result for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub quad: Quad,
    pub confidence: f32,
    #[serde(default)]
    pub space: CoordinateSpace,
}

impl Candidate {
    pub fn pixel(quad: Quad, confidence: f32) -> Self {
        Self {
            quad,
            confidence,
            space: CoordinateSpace::Pixel,
        }
    }

    pub fn normalized(quad: Quad, confidence: f32) -> Self {
        Self {
            quad,
            confidence,
            space: CoordinateSpace::NormalizedBottomLeft,
        }
    }

    /// The candidate's quad in top-left-origin pixels.
    pub fn pixel_quad(&self, frame_width: u32, frame_height: u32) -> Quad {
        match self.space {
            CoordinateSpace::Pixel => self.quad,
            CoordinateSpace::NormalizedBottomLeft => {
                Quad::from_normalized(&self.quad, frame_width as f64, frame_height as f64)
            }
        }
    }
}

/// Which threshold set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptanceMode {
    /// Continuous preview detection feeding auto-capture.
    Live,
    /// One-off detection on a manually captured still.
    Manual,
}

#[derive(Debug, Clone, Default)]
pub struct AcceptanceGate {
    config: AcceptanceConfig,
}

impl AcceptanceGate {
    pub fn new(config: AcceptanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AcceptanceConfig {
        &self.config
    }

    /// Accept or reject a candidate, returning its quad in pixel space.
    pub fn check(
        &self,
        candidate: Option<&Candidate>,
        frame_size: (u32, u32),
        mode: AcceptanceMode,
    ) -> Result<Quad, Rejection> {
        let candidate = candidate.ok_or(Rejection::Miss)?;
        let (min_confidence, min_aspect) = match mode {
            AcceptanceMode::Live => (
                self.config.live_min_confidence,
                self.config.live_min_aspect_ratio,
            ),
            AcceptanceMode::Manual => (
                self.config.manual_min_confidence,
                self.config.manual_min_aspect_ratio,
            ),
        };

        if !(candidate.confidence >= min_confidence) {
            return Err(Rejection::LowConfidence {
                confidence: candidate.confidence,
                required: min_confidence,
            });
        }

        let (width, height) = frame_size;
        let quad = candidate.pixel_quad(width, height);

        let ratio = quad.aspect_ratio();
        if ratio < min_aspect {
            return Err(Rejection::AspectOutOfRange {
                ratio,
                min: min_aspect,
            });
        }

        if mode == AcceptanceMode::Live && width > 0 && height > 0 {
            let bb = quad.bounding_box();
            let width_fraction = bb.width / width as f64;
            let height_fraction = bb.height / height as f64;
            if width_fraction <= self.config.live_min_width_fraction
                || height_fraction <= self.config.live_min_height_fraction
            {
                return Err(Rejection::TooSmall {
                    width_fraction,
                    height_fraction,
                });
            }
        }

        Ok(quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: (u32, u32) = (1920, 1080);

    fn document() -> Quad {
        Quad::from_array([[200.0, 150.0], [1700.0, 150.0], [1700.0, 900.0], [200.0, 900.0]])
    }

    #[test]
    fn test_miss() {
        let gate = AcceptanceGate::default();
        assert_eq!(gate.check(None, FRAME, AcceptanceMode::Live), Err(Rejection::Miss));
    }

    #[test]
    fn test_confidence_threshold_depends_on_mode() {
        let gate = AcceptanceGate::default();
        let c = Candidate::pixel(document(), 0.8);
        assert!(matches!(
            gate.check(Some(&c), FRAME, AcceptanceMode::Live),
            Err(Rejection::LowConfidence { .. })
        ));
        assert_eq!(gate.check(Some(&c), FRAME, AcceptanceMode::Manual), Ok(document()));
    }

    #[test]
    fn test_nan_confidence_rejected() {
        let gate = AcceptanceGate::default();
        let c = Candidate::pixel(document(), f32::NAN);
        assert!(gate.check(Some(&c), FRAME, AcceptanceMode::Manual).is_err());
    }

    #[test]
    fn test_aspect_ratio_bound() {
        let gate = AcceptanceGate::default();
        let sliver = Quad::from_array([[0.0, 0.0], [1800.0, 0.0], [1800.0, 100.0], [0.0, 100.0]]);
        let c = Candidate::pixel(sliver, 0.99);
        assert!(matches!(
            gate.check(Some(&c), FRAME, AcceptanceMode::Manual),
            Err(Rejection::AspectOutOfRange { .. })
        ));
    }

    #[test]
    fn test_live_requires_minimum_size() {
        let gate = AcceptanceGate::default();
        let small = Quad::from_array([[100.0, 100.0], [500.0, 100.0], [500.0, 400.0], [100.0, 400.0]]);
        let c = Candidate::pixel(small, 0.99);
        assert!(matches!(
            gate.check(Some(&c), FRAME, AcceptanceMode::Live),
            Err(Rejection::TooSmall { .. })
        ));
        assert!(gate.check(Some(&c), FRAME, AcceptanceMode::Manual).is_ok());
    }

    #[test]
    fn test_normalized_candidate_is_converted() {
        let gate = AcceptanceGate::default();
        let normalized = Quad::from_array([[0.1, 0.9], [0.9, 0.9], [0.9, 0.1], [0.1, 0.1]]);
        let c = Candidate::normalized(normalized, 0.95);
        let quad = gate.check(Some(&c), (1000, 1000), AcceptanceMode::Live).unwrap();
        assert!((quad.top_left.y - 100.0).abs() < 1e-9);
        assert!((quad.bottom_left.y - 900.0).abs() < 1e-9);
    }
}
