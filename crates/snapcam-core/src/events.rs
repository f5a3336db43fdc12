//! Notifications emitted by camera devices and their in-flight captures.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceId;
use crate::error::CaptureFailure;

/// Kind tag carried by [`CameraEvent::ObjectSpawned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Camera,
}

#[derive(Debug)]
pub enum CameraEvent {
    /// A capture was dispatched. Fired in the same frame as the readback,
    /// before encoding completes.
    SnapshotTaken { device: DeviceId },
    /// The artifact was placed; `src` is its resolved reference.
    PhotoTaken { device: DeviceId, src: String },
    /// The placed object's orientation settled.
    ObjectSpawned { object_type: ObjectType },
    /// The asynchronous encode or placement failed. The capture is dropped.
    CaptureFailed {
        device: DeviceId,
        failure: CaptureFailure,
    },
}

/// Events kept before the oldest start being dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Shared notification queue.
///
/// Every in-flight capture holds a clone, so listeners keep receiving
/// completion events after the device that started the capture is gone.
///
/// Hosts are expected to [`drain`](Self::drain) once per frame. A queue that
/// is never drained holds at most `capacity` events and drops the oldest.
#[derive(Debug, Clone)]
pub struct EventBus {
    queue: Arc<Mutex<VecDeque<CameraEvent>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus holding at most `capacity` undrained events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    pub fn emit(&self, event: CameraEvent) {
        tracing::debug!(?event, "camera event");
        let mut queue = self.queue.lock();
        while queue.len() >= self.capacity {
            let dropped = queue.pop_front();
            tracing::warn!(?dropped, "event queue full, dropping oldest event");
        }
        queue.push_back(event);
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<CameraEvent> {
        std::mem::take(&mut *self.queue.lock()).into()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
