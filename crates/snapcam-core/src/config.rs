//! Construction-time configuration of a camera device.

use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::throttle;

/// Default preview refresh rate in frames per second.
const DEFAULT_PREVIEW_FPS: f32 = 6.0;
/// Default snapshot width in pixels.
const DEFAULT_IMAGE_WIDTH: u32 = 1024;
/// Default snapshot height in pixels (16:9 at the default width).
const DEFAULT_IMAGE_HEIGHT: u32 = 576;

/// Device configuration. Supplied once at construction; the resolution and
/// aspect ratio it implies never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Maximum preview refresh rate.
    pub preview_fps: f32,
    /// Width of the offscreen target and of every snapshot.
    pub image_width: u32,
    /// Height of the offscreen target and of every snapshot.
    pub image_height: u32,
    /// Vertical field of view of the offscreen camera.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Width of the preview screen planes in world units.
    pub screen_width: f32,
    /// Uniform scale applied to the attached model.
    pub model_scale: f32,
    /// Offset from the device position at which snapshots are placed.
    pub spawn_offset: Vec3,
    /// Base filename of every encoded snapshot.
    pub snapshot_filename: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            preview_fps: DEFAULT_PREVIEW_FPS,
            image_width: DEFAULT_IMAGE_WIDTH,
            image_height: DEFAULT_IMAGE_HEIGHT,
            fov_y_degrees: 50.0,
            near: 0.1,
            far: 30000.0,
            screen_width: 0.28,
            model_scale: 2.0,
            spawn_offset: Vec3::new(0.0, -0.5, 0.0),
            snapshot_filename: "snap.png".to_string(),
        }
    }
}

impl CameraConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject configurations the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(ConfigError::Invalid("image dimensions must be non-zero"));
        }
        if !(self.preview_fps.is_finite() && self.preview_fps > 0.0) {
            return Err(ConfigError::Invalid("preview_fps must be a positive number"));
        }
        if throttle::refresh_interval(self.preview_fps).is_none() {
            return Err(ConfigError::Invalid("preview_fps is too low"));
        }
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(ConfigError::Invalid("fov_y_degrees must be within (0, 180)"));
        }
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(ConfigError::Invalid("clip planes must satisfy 0 < near < far"));
        }
        if self.snapshot_filename.is_empty() {
            return Err(ConfigError::Invalid("snapshot_filename must not be empty"));
        }
        Ok(())
    }

    /// Aspect ratio of the offscreen target.
    pub fn aspect(&self) -> f32 {
        self.image_width as f32 / self.image_height as f32
    }

    /// Minimum wall-clock time between two preview refreshes.
    pub fn refresh_interval(&self) -> Duration {
        throttle::refresh_interval(self.preview_fps).unwrap_or(Duration::MAX)
    }
}
