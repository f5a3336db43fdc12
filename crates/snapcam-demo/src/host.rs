//! Minimal headless host: scene state, a static world, registries that log,
//! and a media service that writes snapshots to disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glam::Vec3;
use snapcam_core::{
    DeviceId, EntityId, FleetRegistry, ImageArtifact, MediaSpawner, MirrorRegistry,
    PlacementError, PlacementHandle, RenderContext, SceneGraph, Transform, placement_channel,
};

/// Shared render state of the primary view.
pub struct DemoScene {
    stereo: bool,
    hud: Option<bool>,
    head_scale: Option<Vec3>,
    post_render_hook: Option<&'static str>,
}

impl Default for DemoScene {
    fn default() -> Self {
        Self {
            stereo: false,
            hud: Some(true),
            head_scale: Some(Vec3::splat(0.5)),
            post_render_hook: Some("mirror_composite"),
        }
    }
}

impl RenderContext for DemoScene {
    type PostRenderHook = &'static str;

    fn stereo_enabled(&self) -> bool {
        self.stereo
    }

    fn set_stereo_enabled(&mut self, enabled: bool) {
        self.stereo = enabled;
    }

    fn hud_visible(&self) -> Option<bool> {
        self.hud
    }

    fn set_hud_visible(&mut self, visible: bool) {
        self.hud = Some(visible);
    }

    fn head_scale(&self) -> Option<Vec3> {
        self.head_scale
    }

    fn set_head_scale(&mut self, scale: Vec3) {
        self.head_scale = Some(scale);
    }

    fn update_head_world_transform(&mut self) {
        tracing::trace!(scale = ?self.head_scale, "head world transform updated");
    }

    fn take_post_render_hook(&mut self) -> Option<&'static str> {
        self.post_render_hook.take()
    }

    fn restore_post_render_hook(&mut self, hook: Option<&'static str>) {
        self.post_render_hook = hook;
    }
}

/// Static set of entities.
#[derive(Default)]
pub struct DemoWorld {
    positions: HashMap<EntityId, Vec3>,
}

impl DemoWorld {
    pub fn place(&mut self, entity: EntityId, position: Vec3) {
        self.positions.insert(entity, position);
    }
}

impl SceneGraph for DemoWorld {
    fn world_position(&self, entity: EntityId) -> Option<Vec3> {
        self.positions.get(&entity).copied()
    }
}

/// Registry that only tracks membership and logs changes.
pub struct LoggingRegistry {
    name: &'static str,
    members: HashSet<DeviceId>,
}

impl LoggingRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            members: HashSet::new(),
        }
    }

    fn join(&mut self, device: DeviceId) {
        if self.members.insert(device) {
            tracing::info!(registry = self.name, ?device, "joined");
        }
    }

    fn leave(&mut self, device: DeviceId) {
        if self.members.remove(&device) {
            tracing::info!(registry = self.name, ?device, "left");
        }
    }
}

impl FleetRegistry for LoggingRegistry {
    fn register(&mut self, device: DeviceId) {
        self.join(device);
    }

    fn deregister(&mut self, device: DeviceId) {
        self.leave(device);
    }
}

impl MirrorRegistry for LoggingRegistry {
    fn mirror(&mut self, device: DeviceId) {
        self.join(device);
    }

    fn unmirror(&mut self, device: DeviceId) {
        self.leave(device);
    }
}

/// Places snapshots by writing them into a directory. Resolution and
/// orientation settle immediately.
pub struct DiskMediaSpawner {
    out_dir: PathBuf,
    placed: u32,
}

impl DiskMediaSpawner {
    pub fn new(out_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(out_dir)?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            placed: 0,
        })
    }

    fn next_path(&mut self, filename: &str) -> PathBuf {
        self.placed += 1;
        let name = Path::new(filename);
        let stem = name.file_stem().and_then(|s| s.to_str()).unwrap_or("snap");
        let ext = name.extension().and_then(|s| s.to_str()).unwrap_or("png");
        self.out_dir.join(format!("{stem}-{}.{ext}", self.placed))
    }
}

impl MediaSpawner for DiskMediaSpawner {
    fn spawn_persistent_media(
        &mut self,
        artifact: ImageArtifact,
        anchor: Transform,
    ) -> Result<PlacementHandle, PlacementError> {
        let path = self.next_path(&artifact.filename);
        std::fs::write(&path, &artifact.bytes)
            .map_err(|e| PlacementError::Rejected(format!("{}: {e}", path.display())))?;
        tracing::info!(
            path = %path.display(),
            bytes = artifact.bytes.len(),
            anchor = ?anchor.translation,
            "snapshot written"
        );

        let (mut notifier, handle) = placement_channel();
        notifier.resolve(format!("file://{}", path.display()));
        notifier.orientation_settled();
        Ok(handle)
    }
}
