//! The camera device and the capture state machine it drives.
//!
//! Per frame the host calls [`CameraDevice::tick`] during input handling and
//! [`CameraDevice::tock`] once transforms have settled. `tock` re-aims the
//! device, decides whether the preview is due, brackets the offscreen render
//! with a [`SceneCaptureGuard`](crate::guard::SceneCaptureGuard), reads the
//! pixels back for a pending snapshot and dispatches the asynchronous
//! encode/hand-off. Nothing in `tock` blocks on that asynchronous work.

use std::task::Poll;
use std::time::Duration;

use glam::Vec3;

use crate::config::CameraConfig;
use crate::encoder::PixelEncoder;
use crate::error::{ConfigError, RenderError};
use crate::events::{CameraEvent, EventBus};
use crate::frame::PixelBuffer;
use crate::guard::{RenderContext, with_guarded_render};
use crate::placement::MediaSpawner;
use crate::representation::{
    AttachedModel, FleetRegistry, MirrorRegistry, Representation, RepresentationLoader,
};
use crate::task::{CaptureStage, CaptureTask, EncodeJob, EncodeSpawner};
use crate::throttle::ThrottleGate;
use crate::tracker::{EntityId, OrientationTracker, SceneGraph};
use crate::transform::Transform;
use crate::trigger::{HolderId, InputSource, TriggerRouter};
use crate::viewport::{ColorTarget, OffscreenRenderer, OffscreenViewport};

/// Identifier of a camera device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

/// Capture pipeline state.
///
/// `RefreshDue`, `SnapshotDue` and `ReadingBack` only exist inside a single
/// `tock`. Between frames the device reports `Idle`, or `Encoding` /
/// `HandingOff` while a capture is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    RefreshDue,
    SnapshotDue,
    ReadingBack,
    Encoding,
    HandingOff,
}

/// Per-frame inputs to [`CameraDevice::tock`].
pub struct Frame<'a, C, R> {
    /// Monotonic frame timestamp.
    pub now: Duration,
    pub world: &'a dyn SceneGraph,
    /// Shared state patched around the offscreen render.
    pub render_context: &'a mut C,
    pub renderer: &'a mut R,
}

/// External collaborators a device talks to.
pub struct Services<'a> {
    pub fleet: &'a mut dyn FleetRegistry,
    pub mirror: &'a mut dyn MirrorRegistry,
    pub media: &'a mut dyn MediaSpawner,
    pub encode: &'a mut dyn EncodeSpawner,
}

/// An in-world virtual camera.
pub struct CameraDevice<T> {
    id: DeviceId,
    config: CameraConfig,
    transform: Transform,
    viewport: OffscreenViewport<T>,
    throttle: ThrottleGate,
    tracker: OrientationTracker,
    router: TriggerRouter,
    encoder: PixelEncoder,
    representation: Representation,
    /// Readback destination, sized once and reused for every capture. `None`
    /// while an encode owns it; reallocated only if it never comes back.
    readback: Option<PixelBuffer>,
    state: CaptureState,
    /// Forces one refresh regardless of the throttle.
    refresh_requested: bool,
    /// The pending CaptureRequest. At most one.
    capture_requested: bool,
    in_flight: Option<CaptureTask>,
    preview_generation: u64,
    registered: bool,
    events: EventBus,
}

impl<T: ColorTarget> CameraDevice<T> {
    /// Create a device rendering into `target`. The physical representation
    /// attaches later, when `loader` resolves.
    pub fn new(
        id: DeviceId,
        config: CameraConfig,
        target: T,
        loader: RepresentationLoader,
        events: EventBus,
    ) -> Result<Self, ConfigError> {
        let viewport = OffscreenViewport::new(&config, target)?;
        Ok(Self {
            id,
            throttle: ThrottleGate::new(config.preview_fps),
            encoder: PixelEncoder::new(config.snapshot_filename.clone()),
            readback: Some(PixelBuffer::new(viewport.width(), viewport.height())),
            viewport,
            config,
            transform: Transform::IDENTITY,
            tracker: OrientationTracker::new(),
            router: TriggerRouter::default(),
            representation: Representation::Loading(loader),
            state: CaptureState::Idle,
            refresh_requested: false,
            capture_requested: false,
            in_flight: None,
            preview_generation: 0,
            registered: false,
            events,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable world transform, for holders moving the device.
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn viewport(&self) -> &OffscreenViewport<T> {
        &self.viewport
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn model(&self) -> Option<&AttachedModel> {
        self.representation.model()
    }

    pub fn router_mut(&mut self) -> &mut TriggerRouter {
        &mut self.router
    }

    pub fn tracker(&self) -> &OrientationTracker {
        &self.tracker
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Number of refreshes the preview screens have shown. Stays at zero
    /// until the model is attached.
    pub fn preview_generation(&self) -> u64 {
        self.preview_generation
    }

    /// Pixels of the most recent snapshot readback. `None` while the buffer
    /// is out with an encode.
    pub fn readback(&self) -> Option<&PixelBuffer> {
        self.readback.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn capture_pending(&self) -> bool {
        self.capture_requested
    }

    pub fn capture_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> CaptureState {
        match (&self.in_flight, self.state) {
            (Some(task), CaptureState::Idle) => match task.stage() {
                CaptureStage::Encoding => CaptureState::Encoding,
                CaptureStage::HandingOff => CaptureState::HandingOff,
            },
            (_, state) => state,
        }
    }

    /// Ask for a snapshot on the next `tock`. Returns whether the request was
    /// accepted; it is dropped while another capture is pending or in flight,
    /// and before the model is attached.
    pub fn request_capture(&mut self) -> bool {
        if !self.representation.is_attached() {
            tracing::debug!(device = ?self.id, "capture requested before model attached; ignored");
            return false;
        }
        if self.in_flight.is_some() {
            tracing::debug!(device = ?self.id, "capture already in flight; request dropped");
            return false;
        }
        if self.capture_requested {
            return false;
        }
        self.capture_requested = true;
        true
    }

    /// The device was activated through the host's interaction system.
    /// Equivalent to a held trigger.
    pub fn activate(&mut self) -> bool {
        self.request_capture()
    }

    /// Input phase: fire a capture if the current holder's trigger is down.
    pub fn tick(&mut self, holder: Option<&HolderId>, input: &dyn InputSource) {
        if self.router.is_triggered(holder, input) {
            self.request_capture();
        }
    }

    /// Aim at `target` now and, if `track` is set, keep aiming at it every
    /// frame. Passing `track = false` stops any previous tracking.
    pub fn focus(&mut self, target: EntityId, track: bool, world: &dyn SceneGraph) {
        if track {
            self.tracker.track(target);
        } else {
            self.tracker.clear();
        }
        if let Some(position) = world.world_position(target) {
            self.transform.look_at(position, Vec3::Y);
        }
    }

    pub fn mirror(&self, registry: &mut dyn MirrorRegistry) {
        registry.mirror(self.id);
    }

    pub fn unmirror(&self, registry: &mut dyn MirrorRegistry) {
        registry.unmirror(self.id);
    }

    /// Where a snapshot taken now would be placed.
    pub fn placement_anchor(&self) -> Transform {
        Transform::from_translation(self.transform.translation + self.config.spawn_offset)
            .with_rotation(self.transform.rotation)
    }

    /// Frame phase, after every transform-mutating step has run.
    pub fn tock<C, R>(&mut self, frame: Frame<'_, C, R>, services: &mut Services<'_>)
    where
        C: RenderContext,
        R: OffscreenRenderer<Target = T>,
    {
        self.poll_representation(services.fleet);
        self.poll_in_flight(services.media);

        self.tracker.update(frame.world, &mut self.transform);

        if !self.representation.is_attached() {
            return;
        }

        // A pending snapshot forces a render so it never shows a stale preview.
        let due = self.capture_requested
            || self.refresh_requested
            || self.throttle.due_for_refresh(frame.now);
        if !due {
            return;
        }

        self.state = CaptureState::RefreshDue;
        loop {
            self.state = match self.state {
                CaptureState::RefreshDue => {
                    let renderer = &mut *frame.renderer;
                    let rendered = with_guarded_render(&mut *frame.render_context, |_| {
                        self.viewport.render(renderer, &self.transform)
                    });
                    match rendered {
                        Ok(()) => {
                            self.preview_generation += 1;
                            self.throttle.mark_refreshed(frame.now);
                            self.refresh_requested = false;
                            if self.capture_requested {
                                CaptureState::SnapshotDue
                            } else {
                                CaptureState::Idle
                            }
                        }
                        Err(e) => {
                            log_skipped_frame(self.id, "render", &e);
                            CaptureState::Idle
                        }
                    }
                }
                CaptureState::SnapshotDue => {
                    let (width, height) = (self.viewport.width(), self.viewport.height());
                    let readback = self
                        .readback
                        .get_or_insert_with(|| PixelBuffer::new(width, height));
                    match self.viewport.read_pixels(&mut *frame.renderer, readback) {
                        Ok(()) => CaptureState::ReadingBack,
                        Err(e) => {
                            log_skipped_frame(self.id, "readback", &e);
                            CaptureState::Idle
                        }
                    }
                }
                CaptureState::ReadingBack => {
                    if let Some(buffer) = self.readback.take() {
                        self.dispatch_capture(buffer, services.encode);
                    }
                    CaptureState::Idle
                }
                CaptureState::Idle | CaptureState::Encoding | CaptureState::HandingOff => break,
            };
        }
    }

    /// Tear the device down. Deregisters and unmirrors it, releases the
    /// render target, and returns any capture still in flight so the caller
    /// can poll it to completion.
    pub fn detach(mut self, services: &mut Services<'_>) -> Option<CaptureTask> {
        if self.registered {
            services.fleet.deregister(self.id);
            self.registered = false;
        }
        services.mirror.unmirror(self.id);
        let orphan = self.in_flight.take();
        tracing::info!(
            device = ?self.id,
            orphaned_capture = orphan.is_some(),
            "camera detached"
        );
        orphan
    }

    fn poll_representation(&mut self, fleet: &mut dyn FleetRegistry) {
        let Representation::Loading(loader) = &mut self.representation else {
            return;
        };
        let Some(result) = loader.poll() else {
            return;
        };
        match result {
            Ok(mesh) => {
                self.representation =
                    Representation::Attached(AttachedModel::new(mesh, &self.config));
                fleet.register(self.id);
                self.registered = true;
                self.refresh_requested = true;
                tracing::info!(device = ?self.id, ?mesh, "camera model attached");
            }
            Err(e) => {
                tracing::warn!(device = ?self.id, "camera model failed to load: {e}");
                self.representation = Representation::Failed;
            }
        }
    }

    fn poll_in_flight(&mut self, media: &mut dyn MediaSpawner) {
        let Some(task) = self.in_flight.as_mut() else {
            return;
        };
        let outcome = task.poll(media);
        if self.readback.is_none() {
            self.readback = task.take_buffer();
        }
        if let Poll::Ready(outcome) = outcome {
            tracing::debug!(device = ?self.id, ?outcome, "capture pipeline finished");
            self.in_flight = None;
        }
    }

    fn dispatch_capture(&mut self, buffer: PixelBuffer, encode: &mut dyn EncodeSpawner) {
        let (width, height) = (buffer.width(), buffer.height());
        let handle = encode.spawn(EncodeJob::new(self.encoder.clone(), buffer));
        let task = CaptureTask::new(self.id, self.placement_anchor(), handle, self.events.clone());
        self.in_flight = Some(task);
        self.capture_requested = false;
        tracing::info!(
            device = ?self.id,
            width,
            height,
            "snapshot dispatched"
        );
        self.events.emit(CameraEvent::SnapshotTaken { device: self.id });
    }
}

fn log_skipped_frame(device: DeviceId, stage: &str, err: &RenderError) {
    match err {
        RenderError::Unavailable => {
            tracing::debug!(?device, "{stage} skipped: {err}");
        }
        _ => tracing::warn!(?device, "{stage} failed, retrying next frame: {err}"),
    }
}
