//! Flicker suppression for the on-screen document outline.
//!
//! The last detected quad stays published for a short grace period after
//! detection drops, then clears. Independent of the capture state machine.

use crate::config::OverlayConfig;
use crate::geometry::Quad;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OverlayUpdate {
    Show(Quad),
    Clear,
}

#[derive(Debug, Clone)]
pub struct OverlayHold {
    hold: Duration,
    current: Option<Quad>,
    last_seen: Duration,
}

impl OverlayHold {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            current: None,
            last_seen: Duration::ZERO,
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(config.hold())
    }

    /// The quad currently published, if any.
    pub fn current(&self) -> Option<Quad> {
        self.current
    }

    /// Record this frame's detection. Returns an update only when the published value changes.
    pub fn observe(&mut self, detection: Option<Quad>, now: Duration) -> Option<OverlayUpdate> {
        match detection {
            Some(quad) => {
                self.last_seen = now;
                if self.current == Some(quad) {
                    return None;
                }
                self.current = Some(quad);
                Some(OverlayUpdate::Show(quad))
            }
            None => self.tick(now),
        }
    }

    /// Clear the overlay once the hold has run out.
    pub fn tick(&mut self, now: Duration) -> Option<OverlayUpdate> {
        self.current?;
        if now.saturating_sub(self.last_seen) >= self.hold {
            self.current = None;
            log::trace!("Overlay hold expired");
            return Some(OverlayUpdate::Clear);
        }
        None
    }
}

impl Default for OverlayHold {
    fn default() -> Self {
        Self::from_config(&OverlayConfig::default())
    }
}
