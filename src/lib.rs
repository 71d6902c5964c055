//! CrabScan: live-camera document capture
//!
//! Turns a stream of preview frames and per-frame quadrilateral detections
//! into flat, perspective-corrected document images.
//!
//! # Features
//! - Sliding-window stabilization of noisy corner detections
//! - Automatic capture on a stable outline, with cooldown
//! - Manual single-shot capture, with re-detection on captured stills
//! - Flicker-free overlay publishing
//! - Projective rectification with fallback to the original still
//!
//! # Usage
//! ```rust,no_run
//! use crabscan::testing::{reference_quad, StillCamera, synthetic_document};
//! use crabscan::{Candidate, Frame, PipelineBuilder, ScanConfig};
//!
//! let still = synthetic_document(1920, 1080, &reference_quad());
//! let detector = |_frame: &Frame| Some(Candidate::pixel(reference_quad(), 0.97));
//! let pipeline = PipelineBuilder::new(ScanConfig::default(), detector, StillCamera::new(still))
//!     .start()?;
//! // feed frames with pipeline.submit_frame(..), read pipeline.captures()
//! # Ok::<(), crabscan::ScanError>(())
//! ```
pub mod acceptance;
pub mod capture;
pub mod config;
pub mod errors;
pub mod geometry;
pub mod overlay;
pub mod pipeline;
pub mod rectify;
pub mod replay;
pub mod stability;
pub mod timing;
pub mod window;

// Testing utilities - synthetic frames, stills and detectors
pub mod testing;

// Re-exports for convenience
pub use acceptance::{AcceptanceGate, AcceptanceMode, Candidate, CoordinateSpace};
pub use capture::{
    CaptureController, CaptureDevice, CaptureRequest, CaptureState, CaptureTrigger,
    ControllerDecision,
};
pub use config::ScanConfig;
pub use errors::{Rejection, RectifyError, ScanError};
pub use geometry::{Homography, Point, Quad};
pub use overlay::{OverlayHold, OverlayUpdate};
pub use pipeline::{
    CaptureOutcome, Frame, FrameSender, PipelineBuilder, PipelineEvent, PipelineHandle,
    PixelFormat, QuadDetector,
};
pub use rectify::{DocumentImage, PerspectiveRectifier, RectifiedImage};
pub use stability::{StabilityEvaluator, StabilityVerdict};
pub use timing::{Clock, ManualClock, MonotonicClock};
pub use window::DetectionWindow;

/// Initialize logging for the scanner
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabscan=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
