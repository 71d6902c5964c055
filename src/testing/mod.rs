//! Testing utilities for CrabScan
//!
//! Synthetic preview frames, document stills, detector scripts and capture
//! devices for exercising the pipeline without a camera.

pub mod synthetic_data;

pub use synthetic_data::{
    near_identical_quads, reference_quad, synthetic_document, synthetic_frame, FailingCamera,
    ScriptedDetector, StillCamera, PREVIEW_SIZE,
};
