//! Snapcam GPU — wgpu backend for the offscreen camera viewport.
//!
//! Owns the device's color target and implements
//! [`snapcam_core::OffscreenRenderer`] on top of a plain wgpu device/queue
//! pair. Scene content is supplied through [`SceneDrawer`]; the crate ships a
//! procedural [`SkyDrawer`] so a bare renderer still produces a picture.

pub mod context;
pub mod renderer;
pub mod sky;
pub mod target;

pub use context::{GpuContext, GpuError};
pub use renderer::{SceneDrawer, WgpuOffscreenRenderer};
pub use sky::SkyDrawer;
pub use target::GpuColorTarget;

/// Color format of every offscreen target. Readback yields sRGB-encoded RGBA8,
/// which is what the PNG encoder expects.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
