//! End-to-end capture pipeline tests against in-memory collaborators.
//!
//! Run with: `cargo test -p snapcam-core --test capture_flow`

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::task::Poll;
use std::time::Duration;

use glam::{Vec3, Vec4Swizzles};
use snapcam_core::trigger::RIGHT_HAND_TAKE_SNAPSHOT;
use snapcam_core::{
    ActionPath, AssetError, CameraConfig, CameraDevice, CameraEvent, CaptureOutcome, CaptureState,
    ColorTarget, DeferredSpawner, DeviceId, EntityId, EventBus, FleetRegistry, Frame, HolderId,
    ImageArtifact, MediaSpawner, MeshHandle, MirrorRegistry, ObjectType, OffscreenRenderer,
    PixelBuffer, PlacementError, PlacementHandle, PlacementNotifier, RenderContext, RenderError,
    RenderView, RepresentationSender, RowOrder, SceneGraph, Services, Transform,
    placement_channel, representation_channel,
};

// ── Fakes ───────────────────────────────────────────────────────

struct FakeTarget {
    width: u32,
    height: u32,
}

impl ColorTarget for FakeTarget {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Scene state shared with the renderer so a render can observe it.
struct FakeScene {
    stereo: Rc<Cell<bool>>,
    hud: Option<bool>,
    head_scale: Option<Vec3>,
    hook: Option<&'static str>,
    head_updates: u32,
}

impl FakeScene {
    fn vr() -> Self {
        Self {
            stereo: Rc::new(Cell::new(true)),
            hud: Some(true),
            head_scale: Some(Vec3::splat(0.001)),
            hook: Some("composite"),
            head_updates: 0,
        }
    }
}

impl RenderContext for FakeScene {
    type PostRenderHook = &'static str;

    fn stereo_enabled(&self) -> bool {
        self.stereo.get()
    }
    fn set_stereo_enabled(&mut self, enabled: bool) {
        self.stereo.set(enabled);
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
        self.head_updates += 1;
    }
    fn take_post_render_hook(&mut self) -> Option<&'static str> {
        self.hook.take()
    }
    fn restore_post_render_hook(&mut self, hook: Option<&'static str>) {
        self.hook = hook;
    }
}

/// Renderer that fills a bottom-up buffer with one gray level per row.
struct FakeRenderer {
    stereo: Rc<Cell<bool>>,
    available: bool,
    views: Vec<RenderView>,
    stereo_during_render: Vec<bool>,
    readbacks: u32,
}

impl FakeRenderer {
    fn new(scene: &FakeScene) -> Self {
        Self {
            stereo: scene.stereo.clone(),
            available: true,
            views: Vec::new(),
            stereo_during_render: Vec::new(),
            readbacks: 0,
        }
    }
}

impl OffscreenRenderer for FakeRenderer {
    type Target = FakeTarget;

    fn render_offscreen(
        &mut self,
        _target: &FakeTarget,
        view: &RenderView,
    ) -> Result<(), RenderError> {
        if !self.available {
            return Err(RenderError::Unavailable);
        }
        self.stereo_during_render.push(self.stereo.get());
        self.views.push(*view);
        Ok(())
    }

    fn read_pixels(
        &mut self,
        _target: &FakeTarget,
        out: &mut PixelBuffer,
    ) -> Result<(), RenderError> {
        if !self.available {
            return Err(RenderError::Unavailable);
        }
        let row_bytes = out.row_bytes();
        for (y, row) in out.as_mut_bytes().chunks_exact_mut(row_bytes).enumerate() {
            let level = (y % 256) as u8;
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&[level, level, level, 255]);
            }
        }
        out.set_row_order(RowOrder::BottomUp);
        self.readbacks += 1;
        Ok(())
    }
}

#[derive(Default)]
struct FakeWorld {
    positions: HashMap<EntityId, Vec3>,
}

impl SceneGraph for FakeWorld {
    fn world_position(&self, entity: EntityId) -> Option<Vec3> {
        self.positions.get(&entity).copied()
    }
}

#[derive(Default)]
struct Registry {
    registered: Vec<DeviceId>,
    deregistered: Vec<DeviceId>,
    mirrored: Vec<DeviceId>,
    unmirrored: Vec<DeviceId>,
}

impl FleetRegistry for Registry {
    fn register(&mut self, device: DeviceId) {
        self.registered.push(device);
    }
    fn deregister(&mut self, device: DeviceId) {
        self.deregistered.push(device);
    }
}

impl MirrorRegistry for Registry {
    fn mirror(&mut self, device: DeviceId) {
        self.mirrored.push(device);
    }
    fn unmirror(&mut self, device: DeviceId) {
        self.unmirrored.push(device);
    }
}

/// Media service that either settles every placement immediately or hands
/// the notifiers to the test.
#[derive(Default)]
struct FakeMedia {
    automatic: bool,
    placed: Vec<(ImageArtifact, Transform)>,
    notifiers: Vec<PlacementNotifier>,
}

impl MediaSpawner for FakeMedia {
    fn spawn_persistent_media(
        &mut self,
        artifact: ImageArtifact,
        anchor: Transform,
    ) -> Result<PlacementHandle, PlacementError> {
        let (mut notifier, handle) = placement_channel();
        if self.automatic {
            notifier.resolve(format!("media://{}", self.placed.len()));
            notifier.orientation_settled();
        }
        self.placed.push((artifact, anchor));
        self.notifiers.push(notifier);
        Ok(handle)
    }
}

// ── Harness ─────────────────────────────────────────────────────

const FRAME: Duration = Duration::from_micros(16_667);

struct Harness {
    now: Duration,
    scene: FakeScene,
    renderer: FakeRenderer,
    world: FakeWorld,
    fleet: Registry,
    mirror: Registry,
    media: FakeMedia,
    encode: DeferredSpawner,
}

impl Harness {
    fn new() -> Self {
        let scene = FakeScene::vr();
        Self {
            now: Duration::ZERO,
            renderer: FakeRenderer::new(&scene),
            scene,
            world: FakeWorld::default(),
            fleet: Registry::default(),
            mirror: Registry::default(),
            media: FakeMedia {
                automatic: true,
                ..Default::default()
            },
            encode: DeferredSpawner,
        }
    }

    fn services(&mut self) -> Services<'_> {
        Services {
            fleet: &mut self.fleet,
            mirror: &mut self.mirror,
            media: &mut self.media,
            encode: &mut self.encode,
        }
    }

    /// Run one `tock` at the current time, then advance the clock.
    fn tock(&mut self, device: &mut CameraDevice<FakeTarget>) {
        let frame = Frame {
            now: self.now,
            world: &self.world,
            render_context: &mut self.scene,
            renderer: &mut self.renderer,
        };
        let mut services = Services {
            fleet: &mut self.fleet,
            mirror: &mut self.mirror,
            media: &mut self.media,
            encode: &mut self.encode,
        };
        device.tock(frame, &mut services);
        self.now += FRAME;
    }
}

fn small_config() -> CameraConfig {
    CameraConfig {
        image_width: 64,
        image_height: 36,
        ..CameraConfig::default()
    }
}

fn device_with(
    config: CameraConfig,
    events: &EventBus,
) -> (CameraDevice<FakeTarget>, RepresentationSender) {
    let (tx, loader) = representation_channel();
    let target = FakeTarget {
        width: config.image_width,
        height: config.image_height,
    };
    let device = CameraDevice::new(DeviceId(7), config, target, loader, events.clone())
        .expect("valid config");
    (device, tx)
}

/// Device whose model has attached during one `tock`.
fn attached_device(
    harness: &mut Harness,
    config: CameraConfig,
    events: &EventBus,
) -> CameraDevice<FakeTarget> {
    let (mut device, tx) = device_with(config, events);
    tx.send(Ok(MeshHandle(1))).unwrap();
    harness.tock(&mut device);
    assert!(device.model().is_some());
    device
}

fn trigger() -> HashSet<ActionPath> {
    HashSet::from([RIGHT_HAND_TAKE_SNAPSHOT])
}

fn count(events: &[CameraEvent], pred: impl Fn(&CameraEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

// ── Tests ───────────────────────────────────────────────────────

#[test]
fn test_full_resolution_capture_emits_one_photo() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, CameraConfig::default(), &events);
    device.transform_mut().translation = Vec3::new(1.0, 1.6, -2.0);

    device.tick(Some(&HolderId::RightController), &trigger());
    h.tock(&mut device);

    assert_eq!(h.renderer.readbacks, 1);
    assert_eq!(device.state(), CaptureState::Encoding);
    assert!(matches!(
        &events.drain()[..],
        [CameraEvent::SnapshotTaken { device: DeviceId(7) }]
    ));

    // Deferred encode and the automatic placement both complete next frame.
    h.tock(&mut device);
    assert_eq!(device.state(), CaptureState::Idle);
    assert!(!device.capture_in_flight());

    let events = events.drain();
    assert_eq!(
        count(&events, |e| matches!(e, CameraEvent::PhotoTaken { src, .. } if src == "media://0")),
        1
    );
    assert_eq!(
        count(&events, |e| matches!(
            e,
            CameraEvent::ObjectSpawned {
                object_type: ObjectType::Camera
            }
        )),
        1
    );

    let (artifact, anchor) = &h.media.placed[0];
    assert_eq!(artifact.content_type, "image/png");
    assert_eq!(artifact.filename, "snap.png");
    assert_eq!(anchor.translation, Vec3::new(1.0, 1.1, -2.0));

    let decoded = image::load_from_memory(&artifact.bytes)
        .expect("valid png")
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (1024, 576));
    // Bottom-up readback: the last buffer row is the top of the image.
    let top = (575 % 256) as u8;
    assert_eq!(decoded.get_pixel(0, 0).0, [top, top, top, 255]);
    assert_eq!(decoded.get_pixel(0, 575).0, [0, 0, 0, 255]);
}

#[test]
fn test_rapid_second_request_is_dropped() {
    let mut h = Harness::new();
    h.media.automatic = false;
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);

    device.tick(Some(&HolderId::RightController), &trigger());
    h.tock(&mut device);
    assert!(device.capture_in_flight());

    // 10 ms later, still in flight.
    h.now += Duration::from_millis(10);
    assert!(!device.request_capture());
    device.tick(Some(&HolderId::RightController), &trigger());
    h.tock(&mut device);
    h.tock(&mut device);

    assert_eq!(h.renderer.readbacks, 1);
    assert_eq!(h.media.placed.len(), 1);
    assert_eq!(device.state(), CaptureState::HandingOff);

    h.media.notifiers[0].resolve("media://only");
    h.media.notifiers[0].orientation_settled();
    h.tock(&mut device);

    let events = events.drain();
    assert_eq!(count(&events, |e| matches!(e, CameraEvent::SnapshotTaken { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, CameraEvent::PhotoTaken { .. })), 1);

    // Free again once the pipeline finished.
    assert!(device.request_capture());
}

#[test]
fn test_photo_waits_for_orientation_before_next_capture() {
    let mut h = Harness::new();
    h.media.automatic = false;
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);

    assert!(device.request_capture());
    h.tock(&mut device);
    h.tock(&mut device);
    h.media.notifiers[0].resolve("media://a");
    h.tock(&mut device);

    assert_eq!(count(&events.drain(), |e| matches!(e, CameraEvent::PhotoTaken { .. })), 1);
    assert!(device.capture_in_flight());
    assert!(!device.request_capture());

    h.media.notifiers[0].orientation_settled();
    h.tock(&mut device);
    assert!(!device.capture_in_flight());
}

#[test]
fn test_readback_buffer_reused_across_captures() {
    let mut h = Harness::new();
    h.media.automatic = false;
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);
    let original = device.readback().expect("allocated").as_bytes().as_ptr();

    for (i, src) in ["media://a", "media://b"].into_iter().enumerate() {
        assert!(device.request_capture());
        h.tock(&mut device);
        assert!(device.readback().is_none(), "encode owns the buffer");

        // Encoded but still handing off: the buffer is already back.
        h.tock(&mut device);
        assert!(device.capture_in_flight());
        let readback = device.readback().expect("buffer handed back");
        assert_eq!(readback.as_bytes().as_ptr(), original);

        h.media.notifiers[i].resolve(src);
        h.media.notifiers[i].orientation_settled();
        h.tock(&mut device);
        assert!(!device.capture_in_flight());
    }
    assert_eq!(h.media.placed.len(), 2);
}

#[test]
fn test_asset_failure_leaves_device_inert() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let (mut device, tx) = device_with(small_config(), &events);
    tx.send(Err(AssetError::Load("404".into()))).unwrap();

    for _ in 0..30 {
        device.tick(Some(&HolderId::RightController), &trigger());
        h.tock(&mut device);
    }

    assert!(h.fleet.registered.is_empty());
    assert!(!device.is_registered());
    assert_eq!(device.preview_generation(), 0);
    assert!(h.renderer.views.is_empty());
    assert!(events.is_empty());
    assert!(!device.request_capture());
}

#[test]
fn test_dropped_loader_is_asset_failure() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let (mut device, tx) = device_with(small_config(), &events);
    drop(tx);
    h.tock(&mut device);
    assert!(device.model().is_none());
    assert!(h.fleet.registered.is_empty());
}

#[test]
fn test_attach_registers_and_forces_first_refresh() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let (mut device, tx) = device_with(small_config(), &events);

    h.tock(&mut device);
    assert_eq!(device.preview_generation(), 0);

    tx.send(Ok(MeshHandle(3))).unwrap();
    h.tock(&mut device);
    assert_eq!(h.fleet.registered, vec![DeviceId(7)]);
    assert_eq!(device.preview_generation(), 1);
    assert_eq!(device.model().map(|m| m.mesh), Some(MeshHandle(3)));
}

#[test]
fn test_preview_refresh_rate_is_throttled() {
    let mut h = Harness::new();
    let events = EventBus::new();
    // Attaches and refreshes at t = 0.
    let mut device = attached_device(&mut h, small_config(), &events);

    // One second of 60 Hz frames at the default 6 fps preview.
    for _ in 0..60 {
        h.tock(&mut device);
    }
    assert_eq!(device.preview_generation(), 7);
    assert_eq!(h.renderer.readbacks, 0);
}

#[test]
fn test_snapshot_forces_refresh_between_throttle_ticks() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);
    let before = device.preview_generation();

    h.tock(&mut device);
    assert_eq!(device.preview_generation(), before);

    device.request_capture();
    h.tock(&mut device);
    assert_eq!(device.preview_generation(), before + 1);
    assert_eq!(h.renderer.readbacks, 1);
}

#[test]
fn test_scene_state_restored_around_capture() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);

    device.request_capture();
    h.tock(&mut device);

    assert!(h.renderer.stereo_during_render.iter().all(|stereo| !stereo));
    assert!(h.scene.stereo.get());
    assert_eq!(h.scene.hud, Some(true));
    assert_eq!(h.scene.head_scale, Some(Vec3::splat(0.001)));
    assert_eq!(h.scene.hook, Some("composite"));
    // Two guarded renders, each updating the head on patch and on restore.
    assert_eq!(h.scene.head_updates, 4);
}

#[test]
fn test_unavailable_renderer_retries_pending_capture() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);

    h.renderer.available = false;
    device.request_capture();
    h.tock(&mut device);
    assert!(device.capture_pending());
    assert!(events.is_empty());
    assert!(h.scene.stereo.get());

    h.renderer.available = true;
    h.tock(&mut device);
    assert!(!device.capture_pending());
    assert_eq!(count(&events.drain(), |e| matches!(e, CameraEvent::SnapshotTaken { .. })), 1);
}

#[test]
fn test_detach_mid_flight_still_delivers_photo() {
    let mut h = Harness::new();
    h.media.automatic = false;
    let events = EventBus::new();
    let listener = events.clone();
    let mut device = attached_device(&mut h, small_config(), &events);
    device.mirror(&mut h.mirror);

    device.request_capture();
    h.tock(&mut device);

    let mut orphan = device
        .detach(&mut h.services())
        .expect("capture still in flight");
    assert_eq!(h.fleet.deregistered, vec![DeviceId(7)]);
    assert_eq!(h.mirror.unmirrored, vec![DeviceId(7)]);

    assert!(orphan.poll(&mut h.media).is_pending());
    h.media.notifiers[0].resolve("media://late");
    h.media.notifiers[0].orientation_settled();
    assert_eq!(
        orphan.poll(&mut h.media),
        Poll::Ready(CaptureOutcome::Success {
            src: "media://late".into()
        })
    );
    assert_eq!(
        count(&listener.drain(), |e| matches!(
            e,
            CameraEvent::PhotoTaken {
                device: DeviceId(7),
                ..
            }
        )),
        1
    );
}

#[test]
fn test_detach_before_attach_only_unmirrors() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let (device, _tx) = device_with(small_config(), &events);
    assert!(device.detach(&mut h.services()).is_none());
    assert!(h.fleet.deregistered.is_empty());
    assert_eq!(h.mirror.unmirrored, vec![DeviceId(7)]);
}

#[test]
fn test_tracking_reaims_before_render() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);
    let target = EntityId(42);
    h.world.positions.insert(target, Vec3::new(0.0, 0.0, 5.0));
    device.focus(target, true, &h.world);

    // Target moves to the device's right; the next snapshot must aim there.
    h.world.positions.insert(target, Vec3::new(5.0, 0.0, 0.0));
    device.request_capture();
    h.tock(&mut device);

    let view = h.renderer.views.last().expect("rendered");
    let target_in_view = view.view * h.world.positions[&target].extend(1.0);
    // Straight ahead of a right-handed camera is -Z in view space.
    assert!(target_in_view.xy().length() < 1e-4);
    assert!(target_in_view.z < 0.0);
}

#[test]
fn test_focus_without_tracking_aims_once() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);
    let target = EntityId(1);
    h.world.positions.insert(target, Vec3::new(0.0, 0.0, -3.0));

    device.focus(target, false, &h.world);
    let aimed = device.transform().rotation;
    h.world.positions.insert(target, Vec3::new(3.0, 0.0, 0.0));
    h.tock(&mut device);

    assert!(device.tracker().target().is_none());
    assert_eq!(device.transform().rotation, aimed);
}

#[test]
fn test_trigger_from_other_hand_is_ignored() {
    let mut h = Harness::new();
    let events = EventBus::new();
    let mut device = attached_device(&mut h, small_config(), &events);

    device.tick(Some(&HolderId::LeftController), &trigger());
    device.tick(None, &trigger());
    h.tock(&mut device);
    assert!(events.is_empty());
}
