use super::controller::CaptureRequest;
use crate::errors::ScanError;
use image::DynamicImage;

/// Source of full-resolution stills.
///
/// Called from the capture worker, at most once at a time. Failures are
/// reported to the consumer as-is; there is no retry.
pub trait CaptureDevice: Send {
    fn capture_still(&mut self, request: &CaptureRequest) -> Result<DynamicImage, ScanError>;
}

impl<F> CaptureDevice for F
where
    F: FnMut(&CaptureRequest) -> Result<DynamicImage, ScanError> + Send,
{
    fn capture_still(&mut self, request: &CaptureRequest) -> Result<DynamicImage, ScanError> {
        self(request)
    }
}

