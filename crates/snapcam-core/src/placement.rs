//! Outbound hand-off of finished artifacts to the media placement service.
//!
//! The collaborator receives the artifact plus an anchor transform and
//! answers through a [`PlacementNotifier`]: once when the media resolves (or
//! fails) and once when the placed object's orientation settles. The capture
//! task polls the matching [`PlacementHandle`] once per frame.

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::encoder::ImageArtifact;
use crate::error::PlacementError;
use crate::transform::Transform;

/// Service that turns an artifact into a persistent world object.
pub trait MediaSpawner {
    fn spawn_persistent_media(
        &mut self,
        artifact: ImageArtifact,
        anchor: Transform,
    ) -> Result<PlacementHandle, PlacementError>;
}

/// Collaborator side of a placement.
#[derive(Debug)]
pub struct PlacementNotifier {
    resolved: Option<oneshot::Sender<Result<String, PlacementError>>>,
    oriented: Option<oneshot::Sender<()>>,
}

/// Capture side of a placement.
#[derive(Debug)]
pub struct PlacementHandle {
    resolved: Option<oneshot::Receiver<Result<String, PlacementError>>>,
    oriented: Option<oneshot::Receiver<()>>,
}

/// Create a connected notifier/handle pair.
pub fn placement_channel() -> (PlacementNotifier, PlacementHandle) {
    let (resolved_tx, resolved_rx) = oneshot::channel();
    let (oriented_tx, oriented_rx) = oneshot::channel();
    (
        PlacementNotifier {
            resolved: Some(resolved_tx),
            oriented: Some(oriented_tx),
        },
        PlacementHandle {
            resolved: Some(resolved_rx),
            oriented: Some(oriented_rx),
        },
    )
}

impl PlacementNotifier {
    /// The media loaded; `src` is its resolved reference. Later calls are
    /// ignored.
    pub fn resolve(&mut self, src: impl Into<String>) {
        if let Some(tx) = self.resolved.take() {
            let _ = tx.send(Ok(src.into()));
        }
    }

    /// The media could not be placed.
    pub fn reject(&mut self, reason: impl Into<String>) {
        if let Some(tx) = self.resolved.take() {
            let _ = tx.send(Err(PlacementError::Rejected(reason.into())));
        }
    }

    /// The placed object finished orienting itself.
    pub fn orientation_settled(&mut self) {
        if let Some(tx) = self.oriented.take() {
            let _ = tx.send(());
        }
    }
}

impl PlacementHandle {
    /// `Some` exactly once, when the collaborator resolves, rejects or drops
    /// its notifier.
    pub fn poll_resolved(&mut self) -> Option<Result<String, PlacementError>> {
        let rx = self.resolved.as_mut()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(PlacementError::Dropped),
        };
        self.resolved = None;
        Some(result)
    }

    /// `true` exactly once, when the orientation settles.
    pub fn poll_oriented(&mut self) -> bool {
        let Some(rx) = self.oriented.as_mut() else {
            return false;
        };
        match rx.try_recv() {
            Ok(()) => {
                self.oriented = None;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                self.oriented = None;
                false
            }
        }
    }

    /// Whether an orientation signal can still arrive.
    pub fn awaiting_orientation(&self) -> bool {
        self.oriented.is_some()
    }
}
