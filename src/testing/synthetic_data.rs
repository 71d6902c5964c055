//! Synthetic frames, documents and detections for offline testing
//!
//! Dimensions and corner positions follow a typical 1080p preview with a
//! letter-size page held roughly square to the camera.

use crate::acceptance::Candidate;
use crate::capture::{CaptureDevice, CaptureRequest};
use crate::errors::ScanError;
use crate::geometry::{Point, Quad};
use crate::pipeline::{Frame, PixelFormat, QuadDetector};
use image::{DynamicImage, ImageBuffer, Rgb};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Preview resolution used throughout the fixtures
pub const PREVIEW_SIZE: (u32, u32) = (1920, 1080);

/// Document outline on a [`PREVIEW_SIZE`] frame
pub fn reference_quad() -> Quad {
    Quad::from_array([[200.0, 150.0], [1700.0, 150.0], [1700.0, 900.0], [200.0, 900.0]])
}

/// Per-corner offsets of at most 1px on each axis, so every sample is within 2px of the reference
const NEAR_OFFSETS: [[f64; 2]; 5] = [[0.0, 0.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 0.0], [0.0, 1.0]];

/// `count` quads that differ from `reference` by at most a pixel per coordinate
pub fn near_identical_quads(reference: &Quad, count: usize) -> Vec<Quad> {
    (0..count)
        .map(|i| {
            let corners = reference.corners();
            let mut out = [Point::origin(); 4];
            for (k, (dst, src)) in out.iter_mut().zip(corners.iter()).enumerate() {
                let [dx, dy] = NEAR_OFFSETS[(i + k) % NEAR_OFFSETS.len()];
                *dst = Point::new(src.x + dx, src.y + dy);
            }
            Quad::from_corners(out)
        })
        .collect()
}

/// Gradient preview frame that changes every frame
pub fn synthetic_frame(sequence: u64, width: u32, height: u32) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let base = (sequence % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    Frame::new(width, height, PixelFormat::Rgb8, data).with_timestamp(sequence * 33_333)
}

/// Dark background with a light, ruled page filling `quad`
pub fn synthetic_document(width: u32, height: u32, quad: &Quad) -> DynamicImage {
    let corners = quad.corners();
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
        if inside_convex(&corners, p) {
            if y % 24 < 2 {
                Rgb([60, 60, 70])
            } else {
                Rgb([245, 242, 235])
            }
        } else {
            Rgb([30, 30, 35])
        }
    }))
}

fn inside_convex(corners: &[Point; 4], p: Point) -> bool {
    let mut sign = 0.0;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        if cross != 0.0 {
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
    }
    true
}

/// Detector that replays a fixed list of results, then reports misses
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Option<Candidate>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = Option<Candidate>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The same candidate for the first `count` frames
    pub fn repeating(candidate: Candidate, count: usize) -> Self {
        Self::new(std::iter::repeat(Some(candidate)).take(count))
    }

    /// Shared counter of frames seen, readable after the detector moves into a pipeline
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl QuadDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Option<Candidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().flatten()
    }
}

/// Capture device returning the same still for every request
#[derive(Debug, Clone)]
pub struct StillCamera {
    still: DynamicImage,
    captures: Arc<AtomicUsize>,
}

impl StillCamera {
    pub fn new(still: DynamicImage) -> Self {
        Self {
            still,
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn captures(&self) -> Arc<AtomicUsize> {
        self.captures.clone()
    }
}

impl CaptureDevice for StillCamera {
    fn capture_still(&mut self, _request: &CaptureRequest) -> Result<DynamicImage, ScanError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(self.still.clone())
    }
}

/// Capture device whose every capture fails
#[derive(Debug, Clone, Default)]
pub struct FailingCamera;

impl CaptureDevice for FailingCamera {
    fn capture_still(&mut self, _request: &CaptureRequest) -> Result<DynamicImage, ScanError> {
        Err(ScanError::CaptureDeviceFailure(
            "synthetic device unavailable".to_string(),
        ))
    }
}
