//! Threaded driver wiring frames through detection, stabilization, capture
//! and rectification.
//!
//! Two workers run per pipeline. The detection worker owns the acceptance
//! gate, the capture controller and the overlay hold, and processes frames
//! strictly in order. The capture worker owns the capture device and the
//! rectifier. They exchange messages over `crossbeam-channel`; no state is
//! shared between them.

pub mod detector;
pub mod driver;
pub mod mailbox;
pub mod types;

pub use detector::QuadDetector;
pub use driver::{FrameSender, PipelineBuilder, PipelineHandle};
pub use mailbox::FrameMailbox;
pub use types::{CaptureOutcome, Frame, PipelineEvent, PixelFormat};
