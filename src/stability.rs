//! Temporal stability of the tracked quad.
//!
//! The estimate is the mean of the window samples plus their per-coordinate
//! median, injected as one extra sample. Jitter is the mean summed corner
//! distance of each real sample to that estimate.
//!
//! Replacing the injected median with a plain mean or a plain median
//! changes both the estimate and the jitter.

use crate::config::StabilityConfig;
use crate::geometry::Quad;
use crate::window::DetectionWindow;
use serde::{Deserialize, Serialize};

/// Statistics derived from a set of window samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub median: Quad,
    pub average: Quad,
    pub jitter: f64,
}

/// Outcome of evaluating a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StabilityVerdict {
    InsufficientData { filled: usize, required: usize },
    Stable { quad: Quad, jitter: f64 },
    Unstable { jitter: f64 },
}

impl StabilityVerdict {
    pub fn is_stable(&self) -> bool {
        matches!(self, StabilityVerdict::Stable { .. })
    }

    pub fn jitter(&self) -> Option<f64> {
        match self {
            StabilityVerdict::InsufficientData { .. } => None,
            StabilityVerdict::Stable { jitter, .. } | StabilityVerdict::Unstable { jitter } => {
                Some(*jitter)
            }
        }
    }
}

/// Compute median, biased average and jitter. Jitter is 0 for one sample or none.
pub fn measure(samples: &[Quad]) -> StabilityMetrics {
    let median = Quad::median(samples);

    let mut augmented = Vec::with_capacity(samples.len() + 1);
    augmented.extend_from_slice(samples);
    augmented.push(median);
    let average = Quad::mean(&augmented);

    let jitter = if samples.len() <= 1 {
        0.0
    } else {
        Quad::dispersion(samples, &average)
    };

    StabilityMetrics {
        median,
        average,
        jitter,
    }
}

/// Decides whether a full window is steady enough to capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityEvaluator {
    window_size: usize,
    jitter_threshold: f64,
}

impl StabilityEvaluator {
    pub fn new(window_size: usize, jitter_threshold: f64) -> Self {
        Self {
            window_size: window_size.max(1),
            jitter_threshold,
        }
    }

    pub fn from_config(config: &StabilityConfig) -> Self {
        Self::new(config.window_size, config.jitter_threshold)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn jitter_threshold(&self) -> f64 {
        self.jitter_threshold
    }

    /// An empty window sized for this evaluator.
    pub fn new_window(&self) -> DetectionWindow {
        DetectionWindow::new(self.window_size)
    }

    pub fn evaluate(&self, window: &DetectionWindow) -> StabilityVerdict {
        self.evaluate_samples(&window.samples())
    }

    pub fn evaluate_samples(&self, samples: &[Quad]) -> StabilityVerdict {
        if samples.len() < self.window_size {
            return StabilityVerdict::InsufficientData {
                filled: samples.len(),
                required: self.window_size,
            };
        }

        let metrics = measure(samples);
        log::trace!(
            "window of {} samples: jitter {:.3} (threshold {:.3})",
            samples.len(),
            metrics.jitter,
            self.jitter_threshold
        );

        if metrics.jitter < self.jitter_threshold {
            StabilityVerdict::Stable {
                quad: metrics.average,
                jitter: metrics.jitter,
            }
        } else {
            StabilityVerdict::Unstable {
                jitter: metrics.jitter,
            }
        }
    }

    /// Capture progress in `[0, 1]` for a UI indicator.
    ///
    /// Fill fraction, scaled down by how far jitter exceeds the threshold.
    /// Reaches 1.0 exactly when the window would be judged stable.
    pub fn progress(&self, window: &DetectionWindow) -> f32 {
        let fill = (window.len() as f64 / self.window_size as f64).min(1.0);
        let jitter = measure(&window.samples()).jitter;
        let settle = if jitter < self.jitter_threshold {
            1.0
        } else {
            self.jitter_threshold / jitter
        };
        (fill * settle).clamp(0.0, 1.0) as f32
    }
}

impl Default for StabilityEvaluator {
    fn default() -> Self {
        Self::from_config(&StabilityConfig::default())
    }
}
