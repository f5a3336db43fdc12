//! Snapcam Core — capture and preview pipeline for an in-world virtual camera.
//!
//! This crate contains the throttled preview scheduler, the scoped scene-state
//! guard, the capture state machine, PNG encoding, orientation tracking and
//! trigger routing. No GPU or framework dependencies: rendering, input, asset
//! loading and media placement are reached through the traits defined here.

pub mod config;
pub mod device;
pub mod encoder;
pub mod error;
pub mod events;
pub mod frame;
pub mod guard;
pub mod placement;
pub mod representation;
pub mod task;
pub mod throttle;
pub mod tracker;
pub mod transform;
pub mod trigger;
pub mod viewport;

// Re-exports for convenience.
pub use config::CameraConfig;
pub use device::{CameraDevice, CaptureState, DeviceId, Frame, Services};
pub use encoder::{ImageArtifact, PixelEncoder};
pub use error::{
    AssetError, CaptureFailure, ConfigError, EncodingError, PlacementError, RenderError,
};
pub use events::{CameraEvent, DEFAULT_EVENT_CAPACITY, EventBus, ObjectType};
pub use frame::{PixelBuffer, RowOrder};
pub use guard::{RenderContext, SceneCaptureGuard, with_guarded_render};
pub use placement::{MediaSpawner, PlacementHandle, PlacementNotifier, placement_channel};
pub use representation::{
    AttachedModel, FleetRegistry, MeshHandle, MirrorRegistry, PreviewScreen, Representation,
    RepresentationLoader, RepresentationSender, ScreenKind, representation_channel,
};
pub use task::{
    CaptureOutcome, CaptureStage, CaptureTask, DeferredSpawner, EncodeHandle, EncodeJob,
    EncodeOutput, EncodeSpawner, FailureKind, ThreadSpawner,
};
pub use throttle::ThrottleGate;
pub use tracker::{EntityId, OrientationTracker, SceneGraph, TrackOutcome};
pub use transform::Transform;
pub use trigger::{ActionPath, HolderId, InputSource, TriggerRouter};
pub use viewport::{ColorTarget, OffscreenRenderer, OffscreenViewport, RenderView};
