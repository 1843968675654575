//! Command surface over a shared scan session
//!
//! Two execution contexts drive a scan. The control context calls
//! [`ScanController`] commands, and the host's capture context delivers
//! frames and anchors through a [`CaptureHandle`]. Both serialize on the
//! same session mutex. Events are queued in the order the session changed
//! and delivered by one thread at a time, so a call may return before its
//! events reach the sink when the other context is delivering. Exports run
//! on a worker thread owned by the [`ExportPipeline`]. Their outcome is
//! handed back to the control context (`finish_export` /
//! `try_finish_export`) before `Completed` is emitted.

use crate::config::ScannerConfig;
use crate::error::{ScanError, ScanResult};
use crate::events::{EventEmitter, EventSink, ScanEvent};
use crate::host::{DeviceCapability, HostSession};
use crate::session::{PointRecord, ScanSession, SessionInfo};
use crate::state::ScanState;
use lidarscan_capture::DepthFrame;
use lidarscan_core::{AnchorId, MeshAnchor};
use lidarscan_io::ModelFormat;
use lidarscan_reconstruction::{ExportPipeline, ExportResult};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

struct Shared {
    session: Mutex<ScanSession>,
    emitter: EventEmitter,
    /// Events in session order, waiting for delivery
    pending: Mutex<VecDeque<ScanEvent>>,
    /// Set while one thread is delivering `pending`
    delivering: AtomicBool,
    config: ScannerConfig,
    pipeline: Arc<ExportPipeline>,
    device: Box<dyn DeviceCapability>,
}

impl Shared {
    /// Run `f` with exclusive access, then deliver what it queued
    ///
    /// Events are queued before the session lock is released, so delivery
    /// order always matches the order of state changes across threads.
    fn with_session<R>(&self, f: impl FnOnce(&mut ScanSession) -> R) -> ScanResult<R> {
        let result = {
            let mut session = self.session.lock().map_err(|_| ScanError::SessionPoisoned)?;
            let result = f(&mut session);
            let events = session.take_events();
            if !events.is_empty() {
                self.pending_queue().extend(events);
            }
            result
        };
        self.deliver_pending();
        Ok(result)
    }

    /// Deliver queued events unless another thread already is
    ///
    /// Runs without the session lock, so sinks may call back into the
    /// controller; events they cause are delivered after the current one.
    fn deliver_pending(&self) {
        loop {
            if self
                .delivering
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            let guard = DeliveryGuard(&self.delivering);
            loop {
                // the queue lock is released before the sink runs
                let next = self.pending_queue().pop_front();
                match next {
                    Some(event) => self.emitter.emit(&event),
                    None => break,
                }
            }
            drop(guard);

            // an event queued after the last pop but before the flag cleared
            if self.pending_queue().is_empty() {
                return;
            }
        }
    }

    fn pending_queue(&self) -> MutexGuard<'_, VecDeque<ScanEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the delivery flag even if a sink panics
struct DeliveryGuard<'a>(&'a AtomicBool);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Control-context entry point for one scanner
#[derive(Clone)]
pub struct ScanController {
    shared: Arc<Shared>,
}

impl ScanController {
    pub fn new(
        config: ScannerConfig,
        host: Box<dyn HostSession>,
        device: Box<dyn DeviceCapability>,
    ) -> ScanResult<Self> {
        let pipeline = ExportPipeline::new(config.export.clone());
        Self::with_pipeline(config, host, device, pipeline)
    }

    /// Use a custom export pipeline, e.g. one with a host USDZ writer registered
    pub fn with_pipeline(
        config: ScannerConfig,
        host: Box<dyn HostSession>,
        device: Box<dyn DeviceCapability>,
        pipeline: ExportPipeline,
    ) -> ScanResult<Self> {
        config
            .validate()
            .map_err(|e| ScanError::InvalidArgument(e.to_string()))?;

        let session = ScanSession::new(config.cloud, config.quality.clone(), host, config.host_unavailable);
        Ok(Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                emitter: EventEmitter::new(),
                pending: Mutex::new(VecDeque::new()),
                delivering: AtomicBool::new(false),
                config,
                pipeline: Arc::new(pipeline),
                device,
            }),
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.shared.config
    }

    pub fn pipeline(&self) -> &ExportPipeline {
        &self.shared.pipeline
    }

    /// Handle for the host's frame/anchor delivery thread
    pub fn capture_handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: self.shared.clone(),
        }
    }

    /// Subscribe to the event stream, replacing any previous subscriber
    ///
    /// Only a weak reference is kept; the caller owns the sink.
    pub fn attach<S: EventSink + 'static>(&self, sink: &Arc<S>) {
        self.shared.emitter.attach(sink);
    }

    pub fn detach(&self) {
        self.shared.emitter.detach();
    }

    pub fn state(&self) -> ScanResult<ScanState> {
        self.shared.with_session(|s| s.state())
    }

    pub fn info(&self) -> ScanResult<SessionInfo> {
        self.shared.with_session(|s| s.info())
    }

    pub fn last_export(&self) -> ScanResult<Option<ExportResult>> {
        self.shared.with_session(|s| s.last_export().cloned())
    }

    pub fn check_device_support(&self) -> bool {
        self.shared.device.supports_depth()
    }

    pub fn initialize_scan(&self) -> ScanResult<()> {
        let supported = self.check_device_support();
        self.shared.with_session(|s| s.initialize(supported))?
    }

    pub fn start_scan(&self) -> ScanResult<()> {
        self.shared.with_session(|s| s.start())?
    }

    pub fn pause_scan(&self) -> ScanResult<()> {
        self.shared.with_session(|s| s.pause())?
    }

    pub fn resume_scan(&self) -> ScanResult<()> {
        self.shared.with_session(|s| s.resume())?
    }

    /// Export and wait for the result; the session ends `Completed`
    ///
    /// Capture keeps flowing into other contexts while the worker runs; only
    /// the caller blocks.
    pub fn complete_scan(&self, format: Option<ModelFormat>) -> ScanResult<ExportResult> {
        self.begin_export(format)?;
        self.finish_export()
    }

    /// Move to `Exporting` and start the export worker
    ///
    /// The worker is attached to the session in the same critical section
    /// that enters `Exporting`.
    pub fn begin_export(&self, format: Option<ModelFormat>) -> ScanResult<()> {
        let format = format.unwrap_or(self.shared.config.export.default_format);
        let pipeline = self.shared.pipeline.clone();
        self.shared.with_session(|s| {
            let (request, token) = s.begin_export(format)?;
            info!(
                format = %format,
                points = request.points.len(),
                anchors = request.anchors.len(),
                "export started"
            );
            match pipeline.spawn(request, token) {
                Ok(task) => {
                    s.attach_export(task);
                    Ok(())
                }
                Err(e) => {
                    let message = e.to_string();
                    s.export_failed(message.clone());
                    Err(ScanError::ExportFailure(message))
                }
            }
        })?
    }

    /// Block until the running export delivers its result
    pub fn finish_export(&self) -> ScanResult<ExportResult> {
        let task = self.shared.with_session(|s| match s.take_export() {
            Some(task) => Ok(task),
            None => Err(no_export(s.state())),
        })??;
        let outcome = task.wait();
        self.shared.with_session(|s| s.finish_export(outcome))?
    }

    /// Poll the running export; `Ok(None)` while it is still working
    pub fn try_finish_export(&self) -> ScanResult<Option<ExportResult>> {
        self.shared.with_session(|s| {
            if !s.has_export() {
                return Err(no_export(s.state()));
            }
            match s.poll_export() {
                None => Ok(None),
                Some(outcome) => s.finish_export(outcome).map(Some),
            }
        })?
    }

    pub fn cancel_scan(&self) -> ScanResult<()> {
        self.shared.with_session(|s| s.cancel())?
    }

    /// Drop everything and start over in `Idle`
    pub fn reset_scan(&self) -> ScanResult<()> {
        self.shared.with_session(|s| s.reset())
    }

    pub fn get_point_cloud_data(&self) -> ScanResult<Vec<PointRecord>> {
        self.shared.with_session(|s| s.point_records())
    }

    pub fn get_available_models(&self) -> Vec<PathBuf> {
        self.shared.pipeline.store().list_models()
    }

    pub fn delete_model<P: AsRef<Path>>(&self, path: P) -> bool {
        self.shared.pipeline.store().delete_model(path)
    }

    // Capture context entry points, forwarded for single-threaded hosts

    pub fn on_depth_frame(&self, frame: &DepthFrame<'_>) -> usize {
        self.capture_handle().on_depth_frame(frame)
    }

    pub fn add_anchors(&self, anchors: Vec<MeshAnchor>) -> usize {
        self.capture_handle().add_anchors(anchors)
    }

    pub fn update_anchors(&self, anchors: Vec<MeshAnchor>) -> usize {
        self.capture_handle().update_anchors(anchors)
    }

    pub fn remove_anchors(&self, ids: &[AnchorId]) -> usize {
        self.capture_handle().remove_anchors(ids)
    }

    pub fn host_ready(&self) -> bool {
        self.capture_handle().host_ready()
    }

    pub fn host_unavailable(&self, reason: &str) -> bool {
        self.capture_handle().host_unavailable(reason)
    }
}

fn no_export(state: ScanState) -> ScanError {
    ScanError::InvalidState {
        command: "finishExport",
        state,
    }
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanController")
            .field("state", &self.state().ok())
            .field("emitter", &self.shared.emitter)
            .finish()
    }
}

/// Capture-context entry points
///
/// Errors here are absorbed: bad frames yield no points, late or duplicate
/// notifications are ignored, and a poisoned session drops the delivery.
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

impl CaptureHandle {
    /// Sample a depth frame into the cloud; returns the accepted point count
    pub fn on_depth_frame(&self, frame: &DepthFrame<'_>) -> usize {
        if !frame.is_usable() {
            debug!("skipping unusable depth frame");
            return 0;
        }
        let config = &self.shared.config.capture;
        self.deliver(|s| s.ingest_points(frame.points(config))).unwrap_or(0)
    }

    pub fn add_anchors(&self, anchors: Vec<MeshAnchor>) -> usize {
        self.deliver(|s| s.upsert_anchors(anchors)).unwrap_or(0)
    }

    /// Updates of unknown anchors insert them
    pub fn update_anchors(&self, anchors: Vec<MeshAnchor>) -> usize {
        self.deliver(|s| s.upsert_anchors(anchors)).unwrap_or(0)
    }

    pub fn remove_anchors(&self, ids: &[AnchorId]) -> usize {
        self.deliver(|s| s.remove_anchors(ids)).unwrap_or(0)
    }

    /// The host session finished starting
    pub fn host_ready(&self) -> bool {
        self.deliver(|s| s.host_ready()).unwrap_or(false)
    }

    /// The host session could not start
    pub fn host_unavailable(&self, reason: &str) -> bool {
        self.deliver(|s| s.host_unavailable(reason)).unwrap_or(false)
    }

    fn deliver<R>(&self, f: impl FnOnce(&mut ScanSession) -> R) -> Option<R> {
        match self.shared.with_session(f) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "dropping capture delivery");
                None
            }
        }
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle").finish_non_exhaustive()
    }
}

