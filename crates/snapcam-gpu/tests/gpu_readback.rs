//! GPU integration tests. Skipped when no adapter is available.
//!
//! Run with: `cargo test -p snapcam-gpu`

use std::sync::{Mutex, OnceLock};

use glam::{Quat, Vec3, Vec4};
use snapcam_core::{
    CameraConfig, OffscreenRenderer, OffscreenViewport, PixelBuffer, PixelEncoder, RenderError,
    RowOrder, Transform,
};
use snapcam_gpu::{GpuContext, SkyDrawer, WgpuOffscreenRenderer};

/// Create a test GPU context, or `None` on machines without an adapter.
fn create_test_context() -> Option<GpuContext> {
    match GpuContext::create_blocking() {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

fn gpu_test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn config(width: u32, height: u32) -> CameraConfig {
    CameraConfig {
        image_width: width,
        image_height: height,
        ..CameraConfig::default()
    }
}

#[test]
fn test_gpu_clear_color_reads_back() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let Some(gpu) = create_test_context() else {
        return;
    };
    let mut renderer = WgpuOffscreenRenderer::new(gpu);
    renderer.set_clear_color(wgpu::Color::RED);

    // 100 px rows are not a multiple of the copy alignment.
    let target = renderer.create_target(100, 30).expect("target");
    let viewport = OffscreenViewport::new(&config(100, 30), target).expect("viewport");
    let mut out = PixelBuffer::new(100, 30);

    viewport
        .render(&mut renderer, &Transform::IDENTITY)
        .expect("render");
    viewport
        .read_pixels(&mut renderer, &mut out)
        .expect("readback");

    assert_eq!(out.row_order(), RowOrder::TopDown);
    for px in out.as_bytes().chunks_exact(4) {
        assert_eq!(px, [255, 0, 0, 255]);
    }
}

#[test]
fn test_gpu_staging_buffer_remaps_across_readbacks() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let Some(gpu) = create_test_context() else {
        return;
    };
    let mut renderer = WgpuOffscreenRenderer::new(gpu);
    let target = renderer.create_target(20, 10).expect("target");
    let viewport = OffscreenViewport::new(&config(20, 10), target).expect("viewport");
    let mut out = PixelBuffer::new(20, 10);

    for (color, expected) in [
        (wgpu::Color::RED, [255, 0, 0, 255]),
        (wgpu::Color::GREEN, [0, 255, 0, 255]),
        (wgpu::Color::BLUE, [0, 0, 255, 255]),
    ] {
        renderer.set_clear_color(color);
        viewport
            .render(&mut renderer, &Transform::IDENTITY)
            .expect("render");
        viewport
            .read_pixels(&mut renderer, &mut out)
            .expect("readback");
        assert!(out.as_bytes().chunks_exact(4).all(|px| px == expected));
    }
}

#[test]
fn test_gpu_sky_has_ground_below_horizon() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let Some(gpu) = create_test_context() else {
        return;
    };
    let mut sky = SkyDrawer::new(&gpu);
    sky.ground = Vec4::new(0.0, 1.0, 0.0, 1.0);
    sky.zenith = Vec4::new(0.0, 0.0, 1.0, 1.0);
    sky.horizon = Vec4::new(0.0, 0.0, 1.0, 1.0);
    let mut renderer = WgpuOffscreenRenderer::new(gpu);
    renderer.add_drawer(Box::new(sky));

    let target = renderer.create_target(64, 36).expect("target");
    let viewport = OffscreenViewport::new(&config(64, 36), target).expect("viewport");
    let mut out = PixelBuffer::new(64, 36);

    // Level camera: upper half sky, lower half ground.
    let pose = Transform::from_translation(Vec3::new(0.0, 1.6, 0.0));
    viewport.render(&mut renderer, &pose).expect("render");
    viewport
        .read_pixels(&mut renderer, &mut out)
        .expect("readback");

    let row = |y: usize| &out.as_bytes()[y * out.row_bytes()..y * out.row_bytes() + 4];
    assert_eq!(row(0), [0, 0, 255, 255]);
    assert_eq!(row(35), [0, 255, 0, 255]);

    // Tilted straight down: ground everywhere.
    let down = pose.with_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
    viewport.render(&mut renderer, &down).expect("render");
    viewport
        .read_pixels(&mut renderer, &mut out)
        .expect("readback");
    assert!(out
        .as_bytes()
        .chunks_exact(4)
        .all(|px| px == [0, 255, 0, 255]));
}

#[test]
fn test_gpu_readback_encodes_to_png() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let Some(gpu) = create_test_context() else {
        return;
    };
    let mut renderer = WgpuOffscreenRenderer::new(gpu);
    renderer.set_clear_color(wgpu::Color::WHITE);
    let target = renderer.create_target(32, 18).expect("target");
    let viewport = OffscreenViewport::new(&config(32, 18), target).expect("viewport");
    let mut out = PixelBuffer::new(32, 18);

    viewport
        .render(&mut renderer, &Transform::IDENTITY)
        .expect("render");
    viewport
        .read_pixels(&mut renderer, &mut out)
        .expect("readback");

    let artifact = PixelEncoder::new("snap.png")
        .encode_buffer(&mut out)
        .expect("encode");
    assert_eq!(artifact.content_type, "image/png");
    assert!(artifact.bytes.starts_with(b"\x89PNG"));
}

#[test]
fn test_gpu_mismatched_buffer_rejected() {
    let _lock = gpu_test_lock().lock().expect("gpu test lock poisoned");
    let Some(gpu) = create_test_context() else {
        return;
    };
    let mut renderer = WgpuOffscreenRenderer::new(gpu);
    let target = renderer.create_target(16, 16).expect("target");
    let mut wrong = PixelBuffer::new(8, 8);
    assert!(matches!(
        renderer.read_pixels(&target, &mut wrong),
        Err(RenderError::BufferSize { .. })
    ));
}
