//! Asynchronous encode and hand-off of one capture.
//!
//! A [`CaptureTask`] is created when a readback is dispatched and is polled
//! once per frame. It owns everything it needs (the encode job, the anchor
//! transform and a clone of the event bus), so it can run to completion after
//! its device has been detached.

use std::task::Poll;
use std::thread;

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::device::DeviceId;
use crate::encoder::{ImageArtifact, PixelEncoder};
use crate::error::{CaptureFailure, EncodingError};
use crate::events::{CameraEvent, EventBus, ObjectType};
use crate::frame::PixelBuffer;
use crate::placement::{MediaSpawner, PlacementHandle};
use crate::transform::Transform;

/// A readback buffer plus the encoder to run on it.
#[derive(Debug)]
pub struct EncodeJob {
    encoder: PixelEncoder,
    buffer: PixelBuffer,
}

/// Result of an [`EncodeJob`] together with the buffer it consumed, which
/// the owning device takes back for its next readback.
#[derive(Debug)]
pub struct EncodeOutput {
    pub result: Result<ImageArtifact, EncodingError>,
    pub buffer: PixelBuffer,
}

impl EncodeJob {
    /// Take ownership of `buffer` for the duration of the encode.
    pub fn new(encoder: PixelEncoder, buffer: PixelBuffer) -> Self {
        Self { encoder, buffer }
    }

    pub fn run(mut self) -> EncodeOutput {
        EncodeOutput {
            result: self.encoder.encode_buffer(&mut self.buffer),
            buffer: self.buffer,
        }
    }
}

/// Pending result of an [`EncodeJob`].
#[derive(Debug)]
pub struct EncodeHandle {
    state: EncodeState,
    returned: Option<PixelBuffer>,
}

#[derive(Debug)]
enum EncodeState {
    /// Runs on the polling thread at the first poll.
    Deferred(Option<EncodeJob>),
    /// Runs elsewhere and reports through a channel.
    Channel(oneshot::Receiver<EncodeOutput>),
}

impl EncodeHandle {
    pub fn deferred(job: EncodeJob) -> Self {
        Self {
            state: EncodeState::Deferred(Some(job)),
            returned: None,
        }
    }

    pub fn from_receiver(rx: oneshot::Receiver<EncodeOutput>) -> Self {
        Self {
            state: EncodeState::Channel(rx),
            returned: None,
        }
    }

    /// `Some` once the encode has finished. Not polled again afterwards.
    pub fn poll(&mut self) -> Option<Result<ImageArtifact, EncodingError>> {
        let output = match &mut self.state {
            EncodeState::Deferred(job) => match job.take() {
                Some(job) => job.run(),
                None => return Some(Err(EncodingError::Aborted)),
            },
            EncodeState::Channel(rx) => match rx.try_recv() {
                Ok(output) => output,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => return Some(Err(EncodingError::Aborted)),
            },
        };
        self.returned = Some(output.buffer);
        Some(output.result)
    }

    /// The job's buffer, once the encode has finished with it.
    pub fn take_buffer(&mut self) -> Option<PixelBuffer> {
        self.returned.take()
    }
}

/// Where encode jobs run.
pub trait EncodeSpawner {
    fn spawn(&mut self, job: EncodeJob) -> EncodeHandle;
}

/// Encodes on a short-lived worker thread so PNG compression never stalls
/// the frame loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl EncodeSpawner for ThreadSpawner {
    fn spawn(&mut self, job: EncodeJob) -> EncodeHandle {
        let (tx, rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name("snapcam-encode".to_string())
            .spawn(move || {
                let _ = tx.send(job.run());
            });
        if let Err(e) = spawned {
            // The job went down with the closure; the handle reports Aborted.
            tracing::warn!("failed to start encoder thread: {e}");
        }
        EncodeHandle::from_receiver(rx)
    }
}

/// Encodes on the frame thread during the next poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredSpawner;

impl EncodeSpawner for DeferredSpawner {
    fn spawn(&mut self, job: EncodeJob) -> EncodeHandle {
        EncodeHandle::deferred(job)
    }
}

/// Which asynchronous stage a capture is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Encoding,
    HandingOff,
}

/// Coarse classification of a failed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Encoding,
    Placement,
}

impl CaptureFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Encoding(_) => FailureKind::Encoding,
            Self::Placement(_) => FailureKind::Placement,
        }
    }
}

/// Terminal result of a capture task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The artifact was placed and resolved to `src`.
    Success { src: String },
    /// Dropped; the detailed error went out as [`CameraEvent::CaptureFailed`].
    Failure(FailureKind),
}

/// One capture between readback and placement.
#[derive(Debug)]
pub struct CaptureTask {
    device: DeviceId,
    anchor: Transform,
    events: EventBus,
    stage: Stage,
    spent_buffer: Option<PixelBuffer>,
}

#[derive(Debug)]
enum Stage {
    Encoding(EncodeHandle),
    HandingOff {
        placement: PlacementHandle,
        resolved: Option<String>,
    },
    Finished,
}

enum Step {
    Pending,
    Advance(Stage),
    Fail(CaptureFailure),
    Done(String),
}

impl CaptureTask {
    pub fn new(
        device: DeviceId,
        anchor: Transform,
        encode: EncodeHandle,
        events: EventBus,
    ) -> Self {
        Self {
            device,
            anchor,
            events,
            stage: Stage::Encoding(encode),
            spent_buffer: None,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Placement anchor supplied to the media service.
    pub fn anchor(&self) -> Transform {
        self.anchor
    }

    pub fn stage(&self) -> CaptureStage {
        match self.stage {
            Stage::Encoding(_) => CaptureStage::Encoding,
            Stage::HandingOff { .. } | Stage::Finished => CaptureStage::HandingOff,
        }
    }

    /// Readback buffer released by the finished encode, if not yet taken.
    pub fn take_buffer(&mut self) -> Option<PixelBuffer> {
        self.spent_buffer.take()
    }

    /// Advance the capture. Returns `Ready` once, after the artifact resolved
    /// and its orientation settled, or as soon as any stage fails.
    pub fn poll(&mut self, media: &mut dyn MediaSpawner) -> Poll<CaptureOutcome> {
        loop {
            let step = match &mut self.stage {
                Stage::Encoding(encode) => {
                    let polled = encode.poll();
                    if polled.is_some() {
                        self.spent_buffer = encode.take_buffer();
                    }
                    match polled {
                        None => Step::Pending,
                        Some(Ok(artifact)) => {
                            tracing::debug!(
                                device = ?self.device,
                                bytes = artifact.bytes.len(),
                                "snapshot encoded"
                            );
                            match media.spawn_persistent_media(artifact, self.anchor) {
                                Ok(placement) => Step::Advance(Stage::HandingOff {
                                    placement,
                                    resolved: None,
                                }),
                                Err(e) => Step::Fail(e.into()),
                            }
                        }
                        Some(Err(e)) => Step::Fail(e.into()),
                    }
                }
                Stage::HandingOff {
                    placement,
                    resolved,
                } => {
                    if placement.poll_oriented() {
                        self.events.emit(CameraEvent::ObjectSpawned {
                            object_type: ObjectType::Camera,
                        });
                    }
                    let mut failed = None;
                    if resolved.is_none() {
                        match placement.poll_resolved() {
                            Some(Ok(src)) => {
                                tracing::info!(device = ?self.device, %src, "photo placed");
                                self.events.emit(CameraEvent::PhotoTaken {
                                    device: self.device,
                                    src: src.clone(),
                                });
                                *resolved = Some(src);
                            }
                            Some(Err(e)) => failed = Some(e),
                            None => {}
                        }
                    }
                    match (failed, resolved.take()) {
                        (Some(e), _) => Step::Fail(e.into()),
                        (None, Some(src)) if !placement.awaiting_orientation() => Step::Done(src),
                        (None, src) => {
                            *resolved = src;
                            Step::Pending
                        }
                    }
                }
                Stage::Finished => Step::Pending,
            };

            match step {
                Step::Pending => return Poll::Pending,
                Step::Advance(stage) => self.stage = stage,
                Step::Fail(failure) => {
                    tracing::warn!(device = ?self.device, "capture failed: {failure}");
                    let kind = failure.kind();
                    self.events.emit(CameraEvent::CaptureFailed {
                        device: self.device,
                        failure,
                    });
                    self.stage = Stage::Finished;
                    return Poll::Ready(CaptureOutcome::Failure(kind));
                }
                Step::Done(src) => {
                    self.stage = Stage::Finished;
                    return Poll::Ready(CaptureOutcome::Success { src });
                }
            }
        }
    }
}
