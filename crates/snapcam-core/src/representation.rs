//! The device's physical representation: asynchronously loaded model, the
//! preview screens that sample the offscreen target, and the registries the
//! device joins once the model is attached.

use std::f32::consts::PI;

use glam::{Quat, Vec2, Vec3};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::config::CameraConfig;
use crate::device::DeviceId;
use crate::error::AssetError;
use crate::transform::Transform;

/// Handle to a loaded model, owned by the host's asset system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Registry tracking every live camera device.
pub trait FleetRegistry {
    fn register(&mut self, device: DeviceId);
    fn deregister(&mut self, device: DeviceId);
}

/// Registry that broadcasts a device's view to other surfaces.
pub trait MirrorRegistry {
    fn mirror(&mut self, device: DeviceId);
    fn unmirror(&mut self, device: DeviceId);
}

/// Pending model load.
#[derive(Debug)]
pub struct RepresentationLoader {
    rx: oneshot::Receiver<Result<MeshHandle, AssetError>>,
}

/// Sending half handed to the asset system.
pub type RepresentationSender = oneshot::Sender<Result<MeshHandle, AssetError>>;

/// Create a connected sender/loader pair.
pub fn representation_channel() -> (RepresentationSender, RepresentationLoader) {
    let (tx, rx) = oneshot::channel();
    (tx, RepresentationLoader { rx })
}

impl RepresentationLoader {
    /// `Some` once the asset system has answered or gone away.
    pub fn poll(&mut self) -> Option<Result<MeshHandle, AssetError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(AssetError::Dropped)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    /// Viewfinder on the back of the device.
    Rear,
    /// Mirrored screen above the device, visible from the front.
    Selfie,
}

/// A plane textured with the offscreen target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewScreen {
    pub kind: ScreenKind,
    /// Transform relative to the device.
    pub local: Transform,
    /// Plane size in world units.
    pub size: Vec2,
}

/// Model and screens attached to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedModel {
    pub mesh: MeshHandle,
    pub mesh_scale: Vec3,
    pub screens: [PreviewScreen; 2],
}

impl AttachedModel {
    pub fn new(mesh: MeshHandle, config: &CameraConfig) -> Self {
        let size = Vec2::new(config.screen_width, config.screen_width / config.aspect());
        let rear = PreviewScreen {
            kind: ScreenKind::Rear,
            local: Transform::from_translation(Vec3::new(0.0, 0.0, -0.042))
                .with_rotation(Quat::from_rotation_y(PI)),
            size,
        };
        let selfie = PreviewScreen {
            kind: ScreenKind::Selfie,
            local: Transform::from_translation(Vec3::new(0.0, 0.4, 0.0))
                .with_scale(Vec3::new(-2.0, 2.0, 2.0)),
            size,
        };
        Self {
            mesh,
            mesh_scale: Vec3::splat(config.model_scale),
            screens: [rear, selfie],
        }
    }
}

/// Lifecycle of the physical representation.
#[derive(Debug)]
pub enum Representation {
    Loading(RepresentationLoader),
    Attached(AttachedModel),
    /// The model never resolved. The device stays unregistered and its
    /// preview stays inert.
    Failed,
}

impl Representation {
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }

    pub fn model(&self) -> Option<&AttachedModel> {
        match self {
            Self::Attached(model) => Some(model),
            _ => None,
        }
    }
}
