//! Runtime configuration for the demo.

use std::path::{Path, PathBuf};

use snapcam_core::{CameraConfig, ConfigError};

/// Default directory snapshots are written to.
const DEFAULT_OUT_DIR: &str = "snapshots";

/// Runtime configuration for the headless snapshot demo.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Device configuration, from `SNAPCAM_CONFIG` (a JSON file) or defaults.
    pub camera: CameraConfig,
    /// Where placed snapshots land, from `SNAPCAM_OUT_DIR`.
    pub out_dir: PathBuf,
}

impl DemoConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let camera = match std::env::var_os("SNAPCAM_CONFIG") {
            Some(path) => CameraConfig::from_json_file(Path::new(&path))?,
            None => CameraConfig::default(),
        };
        let out_dir = std::env::var_os("SNAPCAM_OUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
        Ok(Self { camera, out_dir })
    }
}
