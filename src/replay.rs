//! Offline replay of recorded detector output.
//!
//! Runs the acceptance gate, capture controller and overlay hold over a
//! trace on a simulated clock, one step per frame, with no camera and no
//! worker threads. Used by the CLI and for tuning thresholds.

use crate::acceptance::{AcceptanceGate, AcceptanceMode, Candidate};
use crate::capture::{CaptureController, ControllerDecision};
use crate::config::ScanConfig;
use crate::errors::ScanError;
use crate::geometry::Quad;
use crate::overlay::{OverlayHold, OverlayUpdate};
use crate::stability::StabilityVerdict;
use crate::timing::{Clock, ManualClock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_FPS: f64 = 30.0;

/// Detector output recorded frame by frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionTrace {
    pub frame_width: u32,
    pub frame_height: u32,
    #[serde(default)]
    pub fps: Option<f64>,
    /// One entry per frame; `null` is a miss.
    pub detections: Vec<Option<Candidate>>,
}

impl DetectionTrace {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ScanError::Config(format!("invalid detection trace: {e}")))
    }
}

/// What happened on one replayed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    CoolingDown { remaining_ms: u64 },
    Rejected { reason: String, discarded: usize },
    Accumulating { filled: usize, required: usize },
    Unstable { jitter: f64 },
    /// Stable while auto-capture is paused.
    Stable { jitter: f64 },
    Captured { id: Uuid, quad: Quad, jitter: Option<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStep {
    pub index: usize,
    pub at_ms: u64,
    pub outcome: StepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayUpdate>,
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<ReplayStep>,
    pub captures: usize,
}

/// Replay `trace` at `fps` (falling back to the trace's own rate, then 30 fps).
pub fn replay(trace: &DetectionTrace, config: &ScanConfig, fps: Option<f64>) -> ReplayReport {
    let fps = fps
        .or(trace.fps)
        .filter(|f| f.is_finite() && *f > 0.0)
        .unwrap_or(DEFAULT_FPS);
    let interval = Duration::try_from_secs_f64(1.0 / fps).unwrap_or_else(|_| {
        log::warn!("Frame rate {} is out of range, replaying at {} fps", fps, DEFAULT_FPS);
        Duration::from_secs_f64(1.0 / DEFAULT_FPS)
    });
    let frame_size = (trace.frame_width, trace.frame_height);

    let clock = ManualClock::new();
    let gate = AcceptanceGate::new(config.acceptance.clone());
    let mut controller = CaptureController::from_config(config);
    let mut overlay = OverlayHold::from_config(&config.overlay);

    let mut steps = Vec::with_capacity(trace.detections.len());
    let mut captures = 0;

    for (index, candidate) in trace.detections.iter().enumerate() {
        if index > 0 {
            clock.advance(interval);
        }
        let now = clock.now();

        let accepted = gate.check(candidate.as_ref(), frame_size, AcceptanceMode::Live);
        let overlay_update = overlay.observe(accepted.as_ref().ok().copied(), now);

        let outcome = match controller.observe(accepted, frame_size, now) {
            ControllerDecision::CoolingDown { remaining } => StepOutcome::CoolingDown {
                remaining_ms: remaining.as_millis() as u64,
            },
            ControllerDecision::WindowReset {
                rejection,
                discarded,
            } => StepOutcome::Rejected {
                reason: rejection.to_string(),
                discarded,
            },
            ControllerDecision::Evaluated { verdict, .. } => match verdict {
                StabilityVerdict::InsufficientData { filled, required } => {
                    StepOutcome::Accumulating { filled, required }
                }
                StabilityVerdict::Unstable { jitter } => StepOutcome::Unstable { jitter },
                StabilityVerdict::Stable { jitter, .. } => StepOutcome::Stable { jitter },
            },
            ControllerDecision::Capture(request) => {
                captures += 1;
                StepOutcome::Captured {
                    id: request.id,
                    quad: request.quad.unwrap_or_else(Quad::zero),
                    jitter: request.jitter,
                }
            }
        };

        steps.push(ReplayStep {
            index,
            at_ms: now.as_millis() as u64,
            outcome,
            overlay: overlay_update,
            progress: controller.progress(now),
        });
    }

    ReplayReport { steps, captures }
}
