//! [`OffscreenRenderer`] implementation on wgpu.

use std::sync::mpsc;

use snapcam_core::{ColorTarget, OffscreenRenderer, PixelBuffer, RenderError, RenderView, RowOrder};

use crate::context::GpuContext;
use crate::target::GpuColorTarget;

/// Draws scene content into the offscreen pass.
pub trait SceneDrawer {
    /// Upload per-view state before the pass begins.
    fn prepare(&mut self, gpu: &GpuContext, view: &RenderView);

    /// Record draw calls into a pass targeting [`crate::TARGET_FORMAT`].
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>);
}

/// Renders into [`GpuColorTarget`]s and reads them back.
///
/// Constructed without a GPU the renderer reports
/// [`RenderError::Unavailable`] for every call, which callers treat as a
/// skipped frame.
pub struct WgpuOffscreenRenderer {
    gpu: Option<GpuContext>,
    drawers: Vec<Box<dyn SceneDrawer>>,
    clear_color: wgpu::Color,
}

impl WgpuOffscreenRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            gpu: Some(gpu),
            drawers: Vec::new(),
            clear_color: wgpu::Color::BLACK,
        }
    }

    /// Renderer for a host whose GPU has not come up yet.
    pub fn unavailable() -> Self {
        Self {
            gpu: None,
            drawers: Vec::new(),
            clear_color: wgpu::Color::BLACK,
        }
    }

    /// Attach a GPU later, e.g. once the host renderer is initialized.
    pub fn attach_gpu(&mut self, gpu: GpuContext) {
        self.gpu = Some(gpu);
    }

    pub fn gpu(&self) -> Option<&GpuContext> {
        self.gpu.as_ref()
    }

    /// Append a drawer. Drawers run in insertion order.
    pub fn add_drawer(&mut self, drawer: Box<dyn SceneDrawer>) {
        self.drawers.push(drawer);
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    /// Allocate a color target on this renderer's device.
    pub fn create_target(&self, width: u32, height: u32) -> Result<GpuColorTarget, RenderError> {
        let gpu = self.gpu.as_ref().ok_or(RenderError::Unavailable)?;
        Ok(GpuColorTarget::new(gpu.device(), width, height))
    }
}

impl OffscreenRenderer for WgpuOffscreenRenderer {
    type Target = GpuColorTarget;

    fn render_offscreen(
        &mut self,
        target: &GpuColorTarget,
        view: &RenderView,
    ) -> Result<(), RenderError> {
        let gpu = self.gpu.as_ref().ok_or(RenderError::Unavailable)?;
        if target.size() != (view.width, view.height) {
            return Err(RenderError::Device(format!(
                "view is {}x{} but target is {:?}",
                view.width,
                view.height,
                target.size()
            )));
        }

        for drawer in &mut self.drawers {
            drawer.prepare(gpu, view);
        }

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("snapcam_offscreen_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("snapcam_offscreen_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            for drawer in &self.drawers {
                drawer.draw(&mut pass);
            }
        }
        gpu.queue().submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn read_pixels(
        &mut self,
        target: &GpuColorTarget,
        out: &mut PixelBuffer,
    ) -> Result<(), RenderError> {
        let gpu = self.gpu.as_ref().ok_or(RenderError::Unavailable)?;
        let (width, height) = target.size();
        let expected = PixelBuffer::byte_len(width, height);
        if (out.width(), out.height()) != (width, height) {
            return Err(RenderError::BufferSize {
                expected,
                actual: out.as_bytes().len(),
            });
        }

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("snapcam_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: target.staging(),
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(target.padded_bytes_per_row()),
                    rows_per_image: Some(height),
                },
            },
            target.extent(),
        );
        gpu.queue().submit(std::iter::once(encoder.finish()));

        // Blocks until the copy (and every draw before it) has completed.
        let slice = target.staging().slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let mapped = gpu
            .device()
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::Device(e.to_string()))
            .and_then(|_| mapping_outcome(&rx));
        if let Err(e) = mapped {
            release_staging(target.staging());
            return Err(e);
        }

        {
            let data = slice.get_mapped_range();
            let padded = target.padded_bytes_per_row() as usize;
            let row_bytes = out.row_bytes();
            for (dst, src) in out
                .as_mut_bytes()
                .chunks_exact_mut(row_bytes)
                .zip(data.chunks_exact(padded))
            {
                dst.copy_from_slice(&src[..row_bytes]);
            }
        }
        target.staging().unmap();

        // Texture copies start at the top row.
        out.set_row_order(RowOrder::TopDown);
        Ok(())
    }
}

/// Result of a `map_async` request once the device has been polled to idle.
fn mapping_outcome(
    rx: &mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
) -> Result<(), RenderError> {
    match rx.try_recv() {
        Ok(result) => result.map_err(|e| RenderError::Device(e.to_string())),
        Err(_) => Err(RenderError::Device(
            "readback mapping never completed".into(),
        )),
    }
}

/// Drop a pending or completed mapping so the next readback can map again.
fn release_staging(staging: &wgpu::Buffer) {
    if !matches!(staging.map_state(), wgpu::MapState::Unmapped) {
        staging.unmap();
    }
}
