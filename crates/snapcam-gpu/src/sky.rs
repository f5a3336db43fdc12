//! Procedural sky backdrop.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use snapcam_core::RenderView;

use crate::TARGET_FORMAT;
use crate::context::GpuContext;
use crate::renderer::SceneDrawer;

/// Uniform block matching `SkyUniforms` in `sky.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SkyUniforms {
    inv_view_proj: [[f32; 4]; 4],
    horizon: [f32; 4],
    zenith: [f32; 4],
    ground: [f32; 4],
}

/// Gradient sky with a flat ground color below the horizon. Colors are
/// linear RGBA.
pub struct SkyDrawer {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pub horizon: Vec4,
    pub zenith: Vec4,
    pub ground: Vec4,
}

impl SkyDrawer {
    /// Compile `sky.wgsl` and allocate the uniform buffer.
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device();
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("snapcam_sky_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/sky.wgsl").into()),
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("snapcam_sky_uniforms"),
            size: std::mem::size_of::<SkyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("snapcam_sky_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("snapcam_sky_bind_group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("snapcam_sky_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("snapcam_sky_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniforms,
            bind_group,
            horizon: Vec4::new(0.75, 0.85, 0.95, 1.0),
            zenith: Vec4::new(0.15, 0.35, 0.75, 1.0),
            ground: Vec4::new(0.25, 0.22, 0.2, 1.0),
        }
    }
}

impl SceneDrawer for SkyDrawer {
    fn prepare(&mut self, gpu: &GpuContext, view: &RenderView) {
        let inv_view_proj: Mat4 = view.view_projection().inverse();
        let uniforms = SkyUniforms {
            inv_view_proj: inv_view_proj.to_cols_array_2d(),
            horizon: self.horizon.to_array(),
            zenith: self.zenith.to_array(),
            ground: self.ground.to_array(),
        };
        gpu.queue()
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
