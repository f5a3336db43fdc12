//! The device's secondary camera and its fixed-resolution color target.

use std::f32::consts::PI;

use glam::{Mat4, Quat};

use crate::config::CameraConfig;
use crate::error::{ConfigError, RenderError};
use crate::frame::PixelBuffer;
use crate::transform::Transform;

/// A color target owned by exactly one viewport.
pub trait ColorTarget {
    /// Size in pixels as `(width, height)`.
    fn size(&self) -> (u32, u32);
}

/// Camera parameters for one offscreen pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub width: u32,
    pub height: u32,
    /// World-to-view matrix of the offscreen camera.
    pub view: Mat4,
    /// View-to-clip matrix (right-handed, depth in `[0, 1]`).
    pub projection: Mat4,
}

impl RenderView {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Capability of the shared renderer to draw the scene into a device's
/// target and read it back. Both calls are synchronous within a frame.
pub trait OffscreenRenderer {
    type Target: ColorTarget;

    /// Draw the scene from `view` into `target`. Must not touch the primary
    /// framebuffer.
    fn render_offscreen(&mut self, target: &Self::Target, view: &RenderView)
    -> Result<(), RenderError>;

    /// Copy the target's pixels into `out`, blocking until the last draw into
    /// `target` has completed. Sets `out`'s row order.
    fn read_pixels(&mut self, target: &Self::Target, out: &mut PixelBuffer)
    -> Result<(), RenderError>;
}

/// Offscreen camera plus the color target it renders into.
///
/// Resolution, aspect ratio and projection are fixed at construction.
#[derive(Debug)]
pub struct OffscreenViewport<T> {
    target: T,
    width: u32,
    height: u32,
    fov_y: f32,
    near: f32,
    far: f32,
    projection: Mat4,
}

impl<T: ColorTarget> OffscreenViewport<T> {
    /// Wrap `target`, which must match the configured resolution.
    pub fn new(config: &CameraConfig, target: T) -> Result<Self, ConfigError> {
        config.validate()?;
        if target.size() != (config.image_width, config.image_height) {
            return Err(ConfigError::Invalid(
                "render target size does not match the configured resolution",
            ));
        }
        let fov_y = config.fov_y_degrees.to_radians();
        let projection = Mat4::perspective_rh(fov_y, config.aspect(), config.near, config.far);
        Ok(Self {
            target,
            width: config.image_width,
            height: config.image_height,
            fov_y,
            near: config.near,
            far: config.far,
            projection,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn clip_planes(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// The color target the preview screens sample.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Camera parameters for a device at `device_world`. The lens faces the
    /// device's local +Z, so the camera is turned half a revolution about Y.
    pub fn view_for(&self, device_world: &Transform) -> RenderView {
        let lens = device_world.rotation * Quat::from_rotation_y(PI);
        let camera_world = Mat4::from_rotation_translation(lens, device_world.translation);
        RenderView {
            width: self.width,
            height: self.height,
            view: camera_world.inverse(),
            projection: self.projection,
        }
    }

    /// Render the scene from the device's current pose into the target.
    pub fn render<R>(&self, renderer: &mut R, device_world: &Transform) -> Result<(), RenderError>
    where
        R: OffscreenRenderer<Target = T>,
    {
        renderer.render_offscreen(&self.target, &self.view_for(device_world))
    }

    /// Read the most recent render back into `out`.
    pub fn read_pixels<R>(&self, renderer: &mut R, out: &mut PixelBuffer) -> Result<(), RenderError>
    where
        R: OffscreenRenderer<Target = T>,
    {
        let expected = PixelBuffer::byte_len(self.width, self.height);
        if out.as_bytes().len() != expected {
            return Err(RenderError::BufferSize {
                expected,
                actual: out.as_bytes().len(),
            });
        }
        renderer.read_pixels(&self.target, out)
    }
}
