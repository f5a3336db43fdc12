//! Headless snapcam driver: attaches a camera, aims it at a subject, takes
//! one snapshot and writes it to disk.
//!
//! Environment:
//! - `SNAPCAM_CONFIG`: JSON device configuration (optional)
//! - `SNAPCAM_OUT_DIR`: output directory (default `snapshots`)
//! - `RUST_LOG`: log filter (default `info`)

mod config;
mod host;

use std::collections::HashSet;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;
use snapcam_core::trigger::RIGHT_HAND_TAKE_SNAPSHOT;
use snapcam_core::{
    ActionPath, CameraDevice, CameraEvent, CaptureFailure, ConfigError, DeviceId, EntityId,
    EventBus, Frame, HolderId, MeshHandle, RenderError, Services, ThreadSpawner,
    representation_channel,
};
use snapcam_gpu::{GpuContext, GpuError, SkyDrawer, WgpuOffscreenRenderer};
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;
use crate::host::{DemoScene, DemoWorld, DiskMediaSpawner, LoggingRegistry};

/// Target frame period of the driver loop.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Give up if no photo has been placed by then.
const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("GPU: {0}")]
    Gpu(#[from] GpuError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture failed: {0}")]
    Capture(CaptureFailure),
    #[error("no photo placed within {0:?}")]
    Timeout(Duration),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), DemoError> {
    let config = DemoConfig::from_env()?;
    let (width, height) = (config.camera.image_width, config.camera.image_height);

    let gpu = GpuContext::create_blocking()?;
    let mut renderer = WgpuOffscreenRenderer::new(gpu.clone());
    renderer.add_drawer(Box::new(SkyDrawer::new(&gpu)));
    let target = renderer.create_target(width, height)?;

    let events = EventBus::new();
    let (model_tx, loader) = representation_channel();
    let mut device = CameraDevice::new(
        DeviceId(1),
        config.camera.clone(),
        target,
        loader,
        events.clone(),
    )?;
    device.transform_mut().translation = Vec3::new(0.0, 1.6, 0.0);

    let mut world = DemoWorld::default();
    let subject = EntityId(1);
    world.place(subject, Vec3::new(2.0, 2.5, 6.0));
    device.focus(subject, true, &world);

    let mut scene = DemoScene::default();
    let mut fleet = LoggingRegistry::new("fleet");
    let mut mirror = LoggingRegistry::new("mirror");
    let mut media = DiskMediaSpawner::new(&config.out_dir)?;
    let mut encode = ThreadSpawner;
    device.mirror(&mut mirror);

    // The model is ready immediately; a real host answers from its loader.
    let _ = model_tx.send(Ok(MeshHandle(1)));

    let holder = HolderId::RightController;
    let pressed: HashSet<ActionPath> = HashSet::from([RIGHT_HAND_TAKE_SNAPSHOT]);
    let released: HashSet<ActionPath> = HashSet::new();

    let start = Instant::now();
    let mut snapshot_taken = false;
    let mut photo = None;
    while photo.is_none() {
        let now = start.elapsed();
        if now > TIMEOUT {
            return Err(DemoError::Timeout(TIMEOUT));
        }

        // Hold the trigger until the capture is accepted.
        let input = if snapshot_taken { &released } else { &pressed };
        device.tick(Some(&holder), input);

        let frame = Frame {
            now,
            world: &world,
            render_context: &mut scene,
            renderer: &mut renderer,
        };
        let mut services = Services {
            fleet: &mut fleet,
            mirror: &mut mirror,
            media: &mut media,
            encode: &mut encode,
        };
        device.tock(frame, &mut services);

        for event in events.drain() {
            match event {
                CameraEvent::SnapshotTaken { device } => {
                    tracing::info!(?device, "snapshot taken");
                    snapshot_taken = true;
                }
                CameraEvent::PhotoTaken { src, .. } => photo = Some(src),
                CameraEvent::ObjectSpawned { object_type } => {
                    tracing::debug!(?object_type, "object spawned");
                }
                CameraEvent::CaptureFailed { failure, .. } => {
                    return Err(DemoError::Capture(failure));
                }
            }
        }

        thread::sleep(FRAME_INTERVAL);
    }

    tracing::info!(
        src = photo.as_deref().unwrap_or_default(),
        previews = device.preview_generation(),
        "photo placed"
    );

    let mut services = Services {
        fleet: &mut fleet,
        mirror: &mut mirror,
        media: &mut media,
        encode: &mut encode,
    };
    if let Some(mut orphan) = device.detach(&mut services) {
        // Resolution can land before orientation settles.
        while orphan.poll(&mut media).is_pending() {
            thread::sleep(FRAME_INTERVAL);
        }
    }
    Ok(())
}
