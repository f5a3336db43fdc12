//! Continuous re-aim of a device toward a tracked world object.

use glam::Vec3;

use crate::transform::Transform;

/// Identifier of an object in the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// Read access to the host scene's world positions.
pub trait SceneGraph {
    /// World position of `entity`, or `None` once it has left the world.
    fn world_position(&self, entity: EntityId) -> Option<Vec3>;
}

/// Result of one [`OrientationTracker::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Nothing is being tracked.
    Idle,
    /// The device now faces the target.
    Aimed,
    /// The target left the world; tracking was cleared and nothing moved.
    TargetRemoved,
}

/// Holds an optional weak target, addressed by id so the tracker never
/// keeps it alive.
#[derive(Debug, Clone, Default)]
pub struct OrientationTracker {
    target: Option<EntityId>,
}

impl OrientationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn track(&mut self, target: EntityId) {
        self.target = Some(target);
    }

    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Re-aim `device` at the target. Call once per frame after every
    /// transform-mutating step (grabs, physics) has settled.
    pub fn update(&mut self, world: &dyn SceneGraph, device: &mut Transform) -> TrackOutcome {
        let Some(target) = self.target else {
            return TrackOutcome::Idle;
        };
        match world.world_position(target) {
            Some(position) => {
                device.look_at(position, Vec3::Y);
                TrackOutcome::Aimed
            }
            None => {
                tracing::debug!(?target, "tracked target removed");
                self.target = None;
                TrackOutcome::TargetRemoved
            }
        }
    }
}
