//! Error taxonomy for the capture pipeline.
//!
//! Frame-local failures ([`RenderError`]) are swallowed and retried on the
//! next cycle. Failures of the asynchronous encode/hand-off stage are terminal
//! for that capture and surface as a [`CaptureFailure`].

/// Failure of a single frame's offscreen render or readback.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("shared renderer is not available")]
    Unavailable,
    #[error("readback buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("render device error: {0}")]
    Device(String),
}

/// The pixel buffer could not be turned into an image artifact.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid image dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("encoder exited without producing a result")]
    Aborted,
}

/// The external placement collaborator rejected or abandoned an artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("placement rejected: {0}")]
    Rejected(String),
    #[error("placement collaborator dropped the request")]
    Dropped,
}

/// The physical representation of a device could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load physical representation: {0}")]
    Load(String),
    #[error("asset loader dropped the request")]
    Dropped,
}

/// Invalid or unreadable device configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Terminal failure of one asynchronous capture attempt. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum CaptureFailure {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}
