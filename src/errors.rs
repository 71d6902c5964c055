use thiserror::Error;

/// Crate-wide error type.
///
/// Detection-level outcomes are not errors; see [`Rejection`].
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Capture device error: {0}")]
    CaptureDeviceFailure(String),
    #[error("Rectification failed: {0}")]
    RectificationFailed(#[from] RectifyError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Pipeline error: {0}")]
    Pipeline(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Why a perspective rectification could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RectifyError {
    #[error("source image has no pixel data")]
    EmptyImage,
    #[error("quad corners are degenerate (collinear or coincident)")]
    DegenerateQuad,
    #[error("projective transform is not invertible")]
    NonInvertible,
    #[error("output {width}x{height} exceeds maximum side {max}")]
    OutputTooLarge { width: u32, height: u32, max: u32 },
    #[error("no document outline available for this capture")]
    MissingQuad,
}

/// Why a detector candidate was not accepted for this frame.
///
/// Every variant is handled identically by the capture controller
/// (the detection window is reset).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("no quad detected")]
    Miss,
    #[error("confidence {confidence:.3} below required {required:.3}")]
    LowConfidence { confidence: f32, required: f32 },
    #[error("aspect ratio {ratio:.3} below minimum {min:.3}")]
    AspectOutOfRange { ratio: f64, min: f64 },
    #[error("quad covers {width_fraction:.2}x{height_fraction:.2} of the frame")]
    TooSmall {
        width_fraction: f64,
        height_fraction: f64,
    },
}
