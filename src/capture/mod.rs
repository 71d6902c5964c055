//! Capture decisions and the still-capture boundary.

pub mod controller;
pub mod device;

pub use controller::{
    CaptureController, CaptureRequest, CaptureState, CaptureTrigger, ControllerDecision,
};
pub use device::CaptureDevice;
