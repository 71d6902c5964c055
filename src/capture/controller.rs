//! Idle/Cooldown state machine deciding when a still is captured.
//!
//! The controller owns the detection window. In Idle every accepted
//! detection is pushed and the window evaluated; any rejection clears it.
//! A stable verdict issues a [`CaptureRequest`] and enters Cooldown, during
//! which detections are ignored. Cooldown ends by timeout alone.

use crate::config::ScanConfig;
use crate::errors::Rejection;
use crate::geometry::Quad;
use crate::stability::{StabilityEvaluator, StabilityVerdict};
use crate::window::DetectionWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Cooldown { since: Duration },
}

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Cooldown { remaining: Duration },
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureTrigger {
    /// Issued by a stable verdict.
    Auto,
    /// Issued by the user.
    Manual,
}

/// A "take a photo now" command for the capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub id: Uuid,
    pub trigger: CaptureTrigger,
    /// Stabilized quad for automatic captures; best known quad (if any) for manual ones.
    pub quad: Option<Quad>,
    pub jitter: Option<f64>,
    /// Size of the preview frame `quad` is expressed in.
    pub frame_size: (u32, u32),
    pub requested_at: DateTime<Utc>,
}

impl CaptureRequest {
    fn new(
        trigger: CaptureTrigger,
        quad: Option<Quad>,
        jitter: Option<f64>,
        frame_size: (u32, u32),
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            quad,
            jitter,
            frame_size,
            requested_at: Utc::now(),
        }
    }

    /// Map the request quad from preview-frame pixels onto an image of another size.
    pub fn quad_for(&self, width: u32, height: u32) -> Option<Quad> {
        let (fw, fh) = self.frame_size;
        let quad = self.quad?;
        if fw == 0 || fh == 0 || (fw, fh) == (width, height) {
            return Some(quad);
        }
        Some(quad.scaled(width as f64 / fw as f64, height as f64 / fh as f64))
    }
}

/// What the controller did with one detection.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerDecision {
    /// Detection ignored while cooling down.
    CoolingDown { remaining: Duration },
    /// A rejected detection cleared the window.
    WindowReset {
        rejection: Rejection,
        discarded: usize,
    },
    /// Detection pushed and the window evaluated, without a capture.
    Evaluated {
        verdict: StabilityVerdict,
        progress: f32,
    },
    /// Stable window; a capture was issued and Cooldown entered.
    Capture(CaptureRequest),
}

#[derive(Debug, Clone)]
pub struct CaptureController {
    evaluator: StabilityEvaluator,
    window: DetectionWindow,
    cooldown: Duration,
    auto_capture: bool,
    phase: Phase,
    captures_issued: u64,
}

impl CaptureController {
    pub fn new(evaluator: StabilityEvaluator, cooldown: Duration, auto_capture: bool) -> Self {
        Self {
            window: evaluator.new_window(),
            evaluator,
            cooldown,
            auto_capture,
            phase: Phase::Idle,
            captures_issued: 0,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            StabilityEvaluator::from_config(&config.stability),
            config.capture.cooldown(),
            config.capture.auto_capture,
        )
    }

    pub fn state(&self, now: Duration) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::Cooldown { since } => {
                let elapsed = now.saturating_sub(since);
                if elapsed >= self.cooldown {
                    CaptureState::Idle
                } else {
                    CaptureState::Cooldown {
                        remaining: self.cooldown - elapsed,
                    }
                }
            }
        }
    }

    pub fn window(&self) -> &DetectionWindow {
        &self.window
    }

    pub fn evaluator(&self) -> &StabilityEvaluator {
        &self.evaluator
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn auto_capture(&self) -> bool {
        self.auto_capture
    }

    /// Pause or resume automatic capture. Detection and evaluation continue either way.
    pub fn set_auto_capture(&mut self, enabled: bool) {
        if self.auto_capture != enabled {
            log::info!(
                "Auto-capture {}",
                if enabled { "resumed" } else { "paused" }
            );
        }
        self.auto_capture = enabled;
    }

    pub fn captures_issued(&self) -> u64 {
        self.captures_issued
    }

    /// Stability progress for the UI. Zero while cooling down.
    pub fn progress(&self, now: Duration) -> f32 {
        if self.state(now).is_idle() {
            self.evaluator.progress(&self.window)
        } else {
            0.0
        }
    }

    /// Leave Cooldown once the timeout has elapsed. Returns true on that transition.
    pub fn tick(&mut self, now: Duration) -> bool {
        if let Phase::Cooldown { .. } = self.phase {
            if self.state(now).is_idle() {
                self.phase = Phase::Idle;
                self.window.clear();
                log::debug!("Cooldown elapsed, accumulating a fresh window");
                return true;
            }
        }
        false
    }

    /// Feed one frame's acceptance result.
    pub fn observe(
        &mut self,
        detection: Result<Quad, Rejection>,
        frame_size: (u32, u32),
        now: Duration,
    ) -> ControllerDecision {
        self.observe_gated(detection, frame_size, now, true)
    }

    /// Like [`observe`](Self::observe), but a stable window only issues a
    /// capture when `can_trigger` is set. Otherwise it is reported as
    /// `Evaluated` and the window keeps rolling, as when auto-capture is paused.
    pub fn observe_gated(
        &mut self,
        detection: Result<Quad, Rejection>,
        frame_size: (u32, u32),
        now: Duration,
        can_trigger: bool,
    ) -> ControllerDecision {
        self.tick(now);
        if let CaptureState::Cooldown { remaining } = self.state(now) {
            return ControllerDecision::CoolingDown { remaining };
        }

        let quad = match detection {
            Ok(quad) => quad,
            Err(rejection) => {
                let discarded = self.window.len();
                self.window.clear();
                if discarded > 0 {
                    log::trace!("Window reset after {} samples: {}", discarded, rejection);
                }
                return ControllerDecision::WindowReset {
                    rejection,
                    discarded,
                };
            }
        };

        self.window.push(quad);
        let verdict = self.evaluator.evaluate(&self.window);

        match verdict {
            StabilityVerdict::Stable { quad, jitter } if self.auto_capture && can_trigger => {
                let request =
                    CaptureRequest::new(CaptureTrigger::Auto, Some(quad), Some(jitter), frame_size);
                log::info!(
                    "Stable document (jitter {:.2}), requesting capture {}",
                    jitter,
                    request.id
                );
                self.enter_cooldown(now);
                ControllerDecision::Capture(request)
            }
            verdict => ControllerDecision::Evaluated {
                verdict,
                progress: self.evaluator.progress(&self.window),
            },
        }
    }

    /// Issue a user-initiated capture. Refused while cooling down.
    pub fn request_manual(
        &mut self,
        hint: Option<Quad>,
        frame_size: (u32, u32),
        now: Duration,
    ) -> Option<CaptureRequest> {
        self.tick(now);
        if let CaptureState::Cooldown { remaining } = self.state(now) {
            log::warn!(
                "Manual capture refused, cooling down for another {:?}",
                remaining
            );
            return None;
        }

        let request = CaptureRequest::new(CaptureTrigger::Manual, hint, None, frame_size);
        log::info!("Manual capture requested: {}", request.id);
        self.enter_cooldown(now);
        Some(request)
    }

    fn enter_cooldown(&mut self, now: Duration) {
        self.window.clear();
        self.phase = Phase::Cooldown { since: now };
        self.captures_issued += 1;
    }
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: (u32, u32) = (1920, 1080);

    fn doc() -> Quad {
        Quad::from_array([[200.0, 150.0], [1700.0, 150.0], [1700.0, 900.0], [200.0, 900.0]])
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn controller() -> CaptureController {
        CaptureController::new(StabilityEvaluator::new(5, 10.0), ms(2000), true)
    }

    #[test]
    fn test_stable_window_triggers_capture_and_cooldown() {
        let mut c = controller();
        for i in 0..4 {
            let decision = c.observe(Ok(doc()), FRAME, ms(i * 33));
            assert!(matches!(decision, ControllerDecision::Evaluated { .. }));
        }
        let decision = c.observe(Ok(doc()), FRAME, ms(132));
        let request = match decision {
            ControllerDecision::Capture(r) => r,
            other => panic!("expected capture, got {:?}", other),
        };
        assert_eq!(request.trigger, CaptureTrigger::Auto);
        assert_eq!(request.quad, Some(doc()));
        assert_eq!(request.frame_size, FRAME);
        assert!(c.window().is_empty());
        assert_eq!(
            c.state(ms(132)),
            CaptureState::Cooldown { remaining: ms(2000) }
        );
        assert_eq!(c.captures_issued(), 1);
    }

    #[test]
    fn test_cooldown_ignores_detections_until_expiry() {
        let mut c = controller();
        for _ in 0..5 {
            c.observe(Ok(doc()), FRAME, ms(0));
        }
        assert!(!c.state(ms(0)).is_idle());

        let decision = c.observe(Ok(doc()), FRAME, ms(1999));
        assert_eq!(
            decision,
            ControllerDecision::CoolingDown { remaining: ms(1) }
        );
        assert!(c.window().is_empty());

        let decision = c.observe(Ok(doc()), FRAME, ms(2000));
        assert!(matches!(decision, ControllerDecision::Evaluated { .. }));
        assert_eq!(c.window().len(), 1);
    }

    #[test]
    fn test_tick_reports_transition_once() {
        let mut c = controller();
        c.request_manual(None, FRAME, ms(100)).unwrap();
        assert!(!c.tick(ms(500)));
        assert!(c.tick(ms(2100)));
        assert!(!c.tick(ms(2200)));
        assert!(c.state(ms(2200)).is_idle());
    }

    #[test]
    fn test_rejection_clears_partial_window() {
        let mut c = controller();
        for _ in 0..3 {
            c.observe(Ok(doc()), FRAME, ms(0));
        }
        assert_eq!(c.window().len(), 3);

        let decision = c.observe(Err(Rejection::Miss), FRAME, ms(0));
        assert_eq!(
            decision,
            ControllerDecision::WindowReset {
                rejection: Rejection::Miss,
                discarded: 3
            }
        );
        assert_eq!(c.window().len(), 0);
    }

    #[test]
    fn test_paused_auto_capture_keeps_evaluating() {
        let mut c = controller();
        c.set_auto_capture(false);
        for _ in 0..6 {
            let decision = c.observe(Ok(doc()), FRAME, ms(0));
            assert!(!matches!(decision, ControllerDecision::Capture(_)));
        }
        assert!(c.window().is_full());
        assert_eq!(c.progress(ms(0)), 1.0);

        c.set_auto_capture(true);
        assert!(matches!(
            c.observe(Ok(doc()), FRAME, ms(0)),
            ControllerDecision::Capture(_)
        ));
    }

    #[test]
    fn test_held_trigger_does_not_enter_cooldown() {
        let mut c = controller();
        for _ in 0..5 {
            let decision = c.observe_gated(Ok(doc()), FRAME, ms(0), false);
            assert!(matches!(decision, ControllerDecision::Evaluated { .. }));
        }
        assert!(c.state(ms(0)).is_idle());
        assert!(c.window().is_full());
        assert_eq!(c.captures_issued(), 0);

        // Released: the very next stable frame captures
        assert!(matches!(
            c.observe_gated(Ok(doc()), FRAME, ms(33), true),
            ControllerDecision::Capture(_)
        ));
        assert_eq!(c.captures_issued(), 1);
    }

    #[test]
    fn test_manual_capture_refused_while_cooling_down() {
        let mut c = controller();
        let first = c.request_manual(Some(doc()), FRAME, ms(0)).unwrap();
        assert_eq!(first.trigger, CaptureTrigger::Manual);
        assert!(c.request_manual(None, FRAME, ms(1000)).is_none());
        assert!(c.request_manual(None, FRAME, ms(2000)).is_some());
        assert_eq!(c.captures_issued(), 2);
    }

    #[test]
    fn test_request_quad_scales_to_still_size() {
        let request = CaptureRequest::new(CaptureTrigger::Auto, Some(doc()), None, (1920, 1080));
        let scaled = request.quad_for(3840, 2160).unwrap();
        assert_eq!(scaled.top_left.x, 400.0);
        assert_eq!(scaled.bottom_right.y, 1800.0);
        assert_eq!(request.quad_for(1920, 1080), Some(doc()));
    }
}
