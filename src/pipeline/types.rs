use crate::capture::{CaptureRequest, CaptureState};
use crate::errors::{Rejection, ScanError};
use crate::overlay::OverlayUpdate;
use crate::rectify::DocumentImage;
use crate::stability::StabilityVerdict;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Luma8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Luma8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// One preview frame from the frame source.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Assigned on submission, strictly increasing per pipeline.
    pub sequence: u64,
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            sequence: 0,
            timestamp_us: 0,
            width,
            height,
            format,
            data,
        }
    }

    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        Self::new(rgba.width(), rgba.height(), PixelFormat::Rgba8, rgba.into_raw())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when `data` holds exactly `width * height` pixels of `format`.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// View the pixel data as an image. `None` if the buffer size does not match.
    pub fn to_image(&self) -> Option<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let data = self.data.clone();
        match self.format {
            PixelFormat::Luma8 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            PixelFormat::Rgb8 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        }
    }
}

/// Low-priority notifications for the UI. Delivery is best effort.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Overlay(OverlayUpdate),
    Stability {
        sequence: u64,
        verdict: StabilityVerdict,
        progress: f32,
    },
    DetectionRejected {
        sequence: u64,
        rejection: Rejection,
    },
    StateChanged(CaptureState),
    CaptureRequested(CaptureRequest),
    ManualCaptureRefused {
        remaining: Duration,
    },
}

/// Terminal result of one capture request.
#[derive(Debug)]
pub enum CaptureOutcome {
    Completed {
        request: CaptureRequest,
        document: DocumentImage,
    },
    Failed {
        request: CaptureRequest,
        error: ScanError,
    },
}

impl CaptureOutcome {
    pub fn request(&self) -> &CaptureRequest {
        match self {
            CaptureOutcome::Completed { request, .. } | CaptureOutcome::Failed { request, .. } => {
                request
            }
        }
    }

    pub fn document(&self) -> Option<&DocumentImage> {
        match self {
            CaptureOutcome::Completed { document, .. } => Some(document),
            CaptureOutcome::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_image_conversion() {
        let frame = Frame::new(2, 2, PixelFormat::Rgb8, vec![10; 12]);
        assert!(frame.is_well_formed());
        let image = frame.to_image().unwrap();
        assert_eq!((image.width(), image.height()), (2, 2));

        let short = Frame::new(2, 2, PixelFormat::Rgba8, vec![0; 12]);
        assert!(!short.is_well_formed());
        assert!(short.to_image().is_none());
    }

    #[test]
    fn test_frame_from_image_is_rgba() {
        let frame = Frame::from_image(&DynamicImage::new_rgb8(3, 1));
        assert_eq!(frame.format, PixelFormat::Rgba8);
        assert_eq!(frame.data.len(), 12);
    }
}
