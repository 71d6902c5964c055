//! Configuration management for CrabScan
//!
//! Provides configuration loading, saving, and validation for the stability
//! filter, capture cooldown, detection acceptance thresholds, overlay hold,
//! rectification limits and pipeline plumbing.

use crate::errors::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub stability: StabilityConfig,
    pub capture: CaptureConfig,
    pub acceptance: AcceptanceConfig,
    pub overlay: OverlayConfig,
    pub rectify: RectifyConfig,
    pub pipeline: PipelineConfig,
}

/// Temporal stability filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Number of consecutive accepted detections required before evaluating
    pub window_size: usize,
    /// Maximum jitter (pixels, summed over the four corners) considered stable
    pub jitter_threshold: f64,
}

/// Capture state machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Cooldown after each capture in milliseconds
    pub cooldown_ms: u64,
    /// Trigger captures automatically on a stable verdict
    pub auto_capture: bool,
}

/// Detector candidate acceptance thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// Minimum detector confidence in live (automatic) mode
    pub live_min_confidence: f32,
    /// Minimum detector confidence for a manual single-shot still
    pub manual_min_confidence: f32,
    /// Minimum short/long side ratio in live mode
    pub live_min_aspect_ratio: f64,
    /// Minimum short/long side ratio for a manual still
    pub manual_min_aspect_ratio: f64,
    /// Minimum quad width as a fraction of the frame width (live only)
    pub live_min_width_fraction: f64,
    /// Minimum quad height as a fraction of the frame height (live only)
    pub live_min_height_fraction: f64,
}

/// UI overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// How long the last detection stays on screen after a miss
    pub hold_ms: u64,
}

/// Rectification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Largest allowed output side in pixels
    pub max_output_side: u32,
}

/// Worker and channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames buffered between the frame source and the detection worker
    pub frame_queue_capacity: usize,
    /// Pending UI events before new ones are dropped
    pub event_queue_capacity: usize,
    /// Worker wake-up interval when no frames arrive
    pub idle_tick_ms: u64,
    /// Time allowed for worker threads to exit on shutdown
    pub join_timeout_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            jitter_threshold: 10.0,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2000,
            auto_capture: true,
        }
    }
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            live_min_confidence: 0.9,
            manual_min_confidence: 0.7,
            live_min_aspect_ratio: 0.2,
            manual_min_aspect_ratio: 0.3,
            live_min_width_fraction: 0.5,
            live_min_height_fraction: 0.3,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { hold_ms: 200 }
    }
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            max_output_side: 8192,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_queue_capacity: 2,
            event_queue_capacity: 64,
            idle_tick_ms: 20,
            join_timeout_ms: 1000,
        }
    }
}

impl CaptureConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl OverlayConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

impl PipelineConfig {
    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl ScanConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScanError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ScanConfig = toml::from_str(&contents)
            .map_err(|e| ScanError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScanError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ScanError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ScanError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ScanError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabscan.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ScanError> {
        let fail = |msg: &str| Err(ScanError::Config(msg.to_string()));

        if self.stability.window_size == 0 || self.stability.window_size > 120 {
            return fail("Window size must be between 1 and 120");
        }
        if !(self.stability.jitter_threshold.is_finite() && self.stability.jitter_threshold > 0.0)
        {
            return fail("Jitter threshold must be a positive number");
        }

        let a = &self.acceptance;
        if !(0.0..=1.0).contains(&a.live_min_confidence)
            || !(0.0..=1.0).contains(&a.manual_min_confidence)
        {
            return fail("Confidence thresholds must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&a.live_min_aspect_ratio)
            || !(0.0..=1.0).contains(&a.manual_min_aspect_ratio)
        {
            return fail("Aspect ratio thresholds must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&a.live_min_width_fraction)
            || !(0.0..=1.0).contains(&a.live_min_height_fraction)
        {
            return fail("Size fractions must be between 0.0 and 1.0");
        }

        if self.rectify.max_output_side == 0 {
            return fail("Maximum output side must be positive");
        }

        if self.pipeline.frame_queue_capacity == 0 {
            return fail("Frame queue capacity must be at least 1");
        }
        if self.pipeline.event_queue_capacity == 0 {
            return fail("Event queue capacity must be at least 1");
        }
        if self.pipeline.idle_tick_ms == 0 {
            return fail("Idle tick must be at least 1ms");
        }

        Ok(())
    }
}
