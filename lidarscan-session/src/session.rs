//! The scan session aggregate
//!
//! `ScanSession` owns everything one scan produces: the lifecycle state, the
//! bounded point cloud, the live mesh-anchor set, the quality tracker and the
//! host AR session. Every method here runs with exclusive access (the
//! controller keeps the session behind a mutex) and queues the events it
//! wants emitted; the controller drains the queue after releasing the lock.

use crate::error::{ScanError, ScanResult};
use crate::events::{ScanEvent, ScanStatus};
use crate::host::{HostReadiness, HostSession, HostUnavailablePolicy};
use crate::state::{ScanState, ScanTransition};
use chrono::{DateTime, Local};
use lidarscan_capture::{CoverageSample, QualityTracker, QualityWeights};
use lidarscan_core::{AnchorChange, AnchorId, AnchorSet, CloudLimits, MeshAnchor, PointCloud, ScanPoint};
use lidarscan_io::ModelFormat;
use lidarscan_reconstruction::{CancellationToken, ExportOutcome, ExportRequest, ExportResult, ExportTask};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const GUIDANCE_START: &str = "Walk around the object you want to scan";
pub const GUIDANCE_OBJECT_DETECTED: &str = "Object detected. Keep scanning.";
pub const GUIDANCE_SIMULATED: &str = "Depth sensor unavailable, continuing with simulated capture";
pub const GUIDANCE_PAUSED: &str = "Scan paused";
pub const GUIDANCE_RESUMED: &str = "Scan resumed";
pub const GUIDANCE_EXPORTING: &str = "Building 3D model...";
pub const GUIDANCE_EXPORTED: &str = "Model creation complete!";
pub const GUIDANCE_CANCELLED: &str = "Scan cancelled";
pub const GUIDANCE_RESET: &str = "Scan reset";

/// One captured point as handed to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl From<&ScanPoint> for PointRecord {
    fn from(point: &ScanPoint) -> Self {
        let [r, g, b] = match point.color {
            Some([r, g, b]) => [Some(r), Some(g), Some(b)],
            None => [None; 3],
        };
        Self {
            x: point.position.x,
            y: point.position.y,
            z: point.position.z,
            r,
            g,
            b,
            confidence: Some(point.confidence),
        }
    }
}

/// Read-only summary of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub state: ScanState,
    pub point_count: usize,
    pub anchor_count: usize,
    pub progress: f32,
    pub quality: f32,
    pub simulated: bool,
    pub created_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Local>>,
}

pub struct ScanSession {
    state: ScanState,
    cloud: PointCloud,
    anchors: AnchorSet,
    quality: QualityTracker,
    created_at: DateTime<Local>,
    completed_at: Option<DateTime<Local>>,
    host: Box<dyn HostSession>,
    policy: HostUnavailablePolicy,
    host_active: bool,
    simulated: bool,
    object_detected: bool,
    export_cancel: Option<CancellationToken>,
    export_task: Option<ExportTask>,
    last_export: Option<ExportResult>,
    outbox: Vec<ScanEvent>,
}

impl ScanSession {
    pub fn new(
        limits: CloudLimits,
        weights: QualityWeights,
        host: Box<dyn HostSession>,
        policy: HostUnavailablePolicy,
    ) -> Self {
        Self {
            state: ScanState::Idle,
            cloud: PointCloud::with_limits(limits),
            anchors: AnchorSet::new(),
            quality: QualityTracker::new(weights),
            created_at: Local::now(),
            completed_at: None,
            host,
            policy,
            host_active: false,
            simulated: false,
            object_detected: false,
            export_cancel: None,
            export_task: None,
            last_export: None,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn quality(&self) -> f32 {
        self.quality.current()
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at
    }

    pub fn last_export(&self) -> Option<&ExportResult> {
        self.last_export.as_ref()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            state: self.state,
            point_count: self.cloud.len(),
            anchor_count: self.anchors.len(),
            progress: self.cloud.progress(),
            quality: self.quality.current(),
            simulated: self.simulated,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    pub fn point_records(&self) -> Vec<PointRecord> {
        self.cloud.iter().map(PointRecord::from).collect()
    }

    /// Drain the events queued since the last call
    pub fn take_events(&mut self) -> Vec<ScanEvent> {
        std::mem::take(&mut self.outbox)
    }

    // --- lifecycle ---

    /// `Idle -> Initializing`, then start the host session
    pub fn initialize(&mut self, device_supported: bool) -> ScanResult<()> {
        let next = self.check(ScanTransition::Initialize, "initializeScan")?;
        if !device_supported && self.policy == HostUnavailablePolicy::Fail {
            return Err(ScanError::UnsupportedDevice);
        }

        self.clear_capture();
        self.created_at = Local::now();
        self.completed_at = None;
        self.simulated = false;
        self.last_export = None;
        self.apply(next);

        if !device_supported {
            return self.host_failed("device has no depth sensor".to_string());
        }
        self.start_host()
    }

    /// Retry the host start while initializing; re-announce the scan while scanning
    pub fn start(&mut self) -> ScanResult<()> {
        self.check(ScanTransition::Start, "startScan")?;
        match self.state {
            ScanState::Initializing => self.start_host(),
            _ => {
                self.push(ScanEvent::status(ScanStatus::Started));
                Ok(())
            }
        }
    }

    /// The host reports its session is running; ignored outside `Initializing`
    pub fn host_ready(&mut self) -> bool {
        if self.state != ScanState::Initializing {
            debug!(state = %self.state, "ignoring host ready notification");
            return false;
        }
        self.host_active = true;
        self.enter_scanning(ScanTransition::HostReady);
        true
    }

    /// The host reports its session cannot run; ignored outside `Initializing`
    pub fn host_unavailable(&mut self, reason: &str) -> bool {
        if self.state != ScanState::Initializing {
            debug!(state = %self.state, reason, "ignoring host unavailable notification");
            return false;
        }
        // Either way the failure has been reported through events
        let _ = self.host_failed(reason.to_string());
        true
    }

    pub fn pause(&mut self) -> ScanResult<()> {
        let next = self.check(ScanTransition::Pause, "pauseScan")?;
        if self.host_active {
            self.host.pause().map_err(|e| ScanError::SessionUnavailable(e.to_string()))?;
        }
        self.apply(next);
        self.push(ScanEvent::status(ScanStatus::Paused));
        self.push(ScanEvent::guidance(GUIDANCE_PAUSED));
        Ok(())
    }

    pub fn resume(&mut self) -> ScanResult<()> {
        let next = self.check(ScanTransition::Resume, "resumeScan")?;
        if self.host_active {
            self.host.resume().map_err(|e| ScanError::SessionUnavailable(e.to_string()))?;
        }
        self.apply(next);
        self.push(ScanEvent::status(ScanStatus::Resumed));
        self.push(ScanEvent::guidance(GUIDANCE_RESUMED));
        Ok(())
    }

    /// `Scanning | Paused -> Exporting`; returns the detached export input
    ///
    /// Capture ends here, so the host session is released.
    pub fn begin_export(&mut self, format: ModelFormat) -> ScanResult<(ExportRequest, CancellationToken)> {
        let next = self.check(ScanTransition::Complete, "completeScan")?;
        self.stop_host();
        self.apply(next);

        let token = CancellationToken::new();
        self.export_cancel = Some(token.clone());
        let request = ExportRequest::new(self.cloud.snapshot(), self.anchors.snapshot(), format);

        self.push(ScanEvent::status(ScanStatus::Exporting));
        self.push(ScanEvent::guidance(GUIDANCE_EXPORTING));
        Ok((request, token))
    }

    /// Deliver the worker's outcome back to the session
    pub fn finish_export(&mut self, outcome: lidarscan_core::Result<ExportOutcome>) -> ScanResult<ExportResult> {
        if self.state != ScanState::Exporting {
            debug!(state = %self.state, "export finished after the session moved on");
            return Err(ScanError::Cancelled);
        }
        self.export_cancel = None;

        match outcome {
            Ok(ExportOutcome::Finished(result)) => {
                self.apply(ScanState::Completed);
                self.completed_at = Some(Local::now());
                if result.placeholder {
                    warn!(
                        path = %result.model_path.display(),
                        reason = result.error_message.as_deref().unwrap_or("no mesh anchors"),
                        "scan exported as placeholder"
                    );
                }
                if !result.success {
                    let message = result.error_message.clone().unwrap_or_else(|| "export failed".to_string());
                    self.push(ScanEvent::error(message));
                }
                self.last_export = Some(result.clone());
                self.push(ScanEvent::ExportComplete { result: result.clone() });
                self.push(ScanEvent::guidance(GUIDANCE_EXPORTED));
                self.push(ScanEvent::status(ScanStatus::Completed));
                Ok(result)
            }
            Ok(ExportOutcome::Cancelled) => {
                self.cancel()?;
                Err(ScanError::Cancelled)
            }
            Err(e) => {
                self.export_failed(e.to_string());
                Err(ScanError::ExportFailure(e.to_string()))
            }
        }
    }

    /// Keep the worker started for the current export
    pub fn attach_export(&mut self, task: ExportTask) {
        if let Some(stale) = self.export_task.replace(task) {
            stale.cancel();
        }
    }

    pub fn has_export(&self) -> bool {
        self.export_task.is_some()
    }

    /// Hand the worker to a caller that blocks on it outside the session lock
    pub fn take_export(&mut self) -> Option<ExportTask> {
        self.export_task.take()
    }

    /// Non-blocking check of the attached worker; the task is released once it reports
    pub fn poll_export(&mut self) -> Option<lidarscan_core::Result<ExportOutcome>> {
        let outcome = self.export_task.as_mut()?.try_result()?;
        self.export_task = None;
        Some(outcome)
    }

    /// The export could not run at all
    pub fn export_failed(&mut self, message: String) {
        if let Some(next) = self.state.next(ScanTransition::ExportFailed) {
            self.apply(next);
        }
        self.export_cancel = None;
        self.export_task = None;
        warn!(error = %message, "export failed");
        self.push(ScanEvent::error(format!("Export failed: {message}")));
        self.push(ScanEvent::status(ScanStatus::Failed));
    }

    /// Clear all capture data, release the host and stop any in-flight export
    ///
    /// An idle session has nothing to clear, so cancelling it is a silent no-op.
    pub fn cancel(&mut self) -> ScanResult<()> {
        let next = self.check(ScanTransition::Cancel, "cancelScan")?;
        if self.state == ScanState::Idle {
            debug!("cancel on idle session ignored");
            return Ok(());
        }
        self.cancel_export();
        self.stop_host();
        self.clear_capture();
        self.apply(next);
        self.push(ScanEvent::status(ScanStatus::Cancelled));
        self.push(ScanEvent::guidance(GUIDANCE_CANCELLED));
        Ok(())
    }

    /// Back to a fresh `Idle` session from any state
    pub fn reset(&mut self) {
        self.cancel_export();
        if self.export_task.take().is_some() {
            debug!("detached cancelled export worker");
        }
        self.stop_host();
        self.clear_capture();
        self.created_at = Local::now();
        self.completed_at = None;
        self.simulated = false;
        self.last_export = None;
        self.apply(ScanState::Idle);
        self.push(ScanEvent::status(ScanStatus::Reset));
        self.push(ScanEvent::guidance(GUIDANCE_RESET));
    }

    // --- capture ---

    /// Append sampled points; returns how many were accepted
    ///
    /// Outside `Scanning` nothing is consumed. Stops pulling from `points`
    /// once the cloud is full.
    pub fn ingest_points<I: IntoIterator<Item = ScanPoint>>(&mut self, points: I) -> usize {
        if !self.state.accepts_capture() {
            return 0;
        }
        let accepted = self.cloud.append_all(points);
        if accepted > 0 {
            self.report_progress();
        }
        accepted
    }

    /// Insert or replace anchors by identity; returns how many changed
    pub fn upsert_anchors<I: IntoIterator<Item = MeshAnchor>>(&mut self, anchors: I) -> usize {
        if !self.state.accepts_capture() {
            return 0;
        }
        let changed = anchors
            .into_iter()
            .map(|anchor| self.anchors.upsert(anchor))
            .filter(|change| matches!(change, AnchorChange::Inserted | AnchorChange::Replaced))
            .count();

        if changed > 0 {
            if !self.object_detected {
                self.object_detected = true;
                self.push(ScanEvent::guidance(GUIDANCE_OBJECT_DETECTED));
            }
            self.report_progress();
        }
        changed
    }

    /// Remove anchors by identity; unknown identities are ignored
    pub fn remove_anchors(&mut self, ids: &[AnchorId]) -> usize {
        if !self.state.accepts_capture() {
            return 0;
        }
        let removed = ids
            .iter()
            .filter(|id| self.anchors.remove(id) == AnchorChange::Removed)
            .count();
        if removed > 0 {
            self.report_progress();
        }
        removed
    }

    // --- internals ---

    fn check(&self, transition: ScanTransition, command: &'static str) -> ScanResult<ScanState> {
        self.state.next(transition).ok_or_else(|| {
            debug!(command, state = %self.state, "command rejected");
            ScanError::InvalidState {
                command,
                state: self.state,
            }
        })
    }

    fn apply(&mut self, next: ScanState) {
        if next != self.state {
            info!(from = %self.state, to = %next, "scan state changed");
        }
        self.state = next;
    }

    fn push(&mut self, event: ScanEvent) {
        self.outbox.push(event);
    }

    fn start_host(&mut self) -> ScanResult<()> {
        match self.host.start() {
            Ok(HostReadiness::Ready) => {
                self.host_active = true;
                self.enter_scanning(ScanTransition::HostReady);
                Ok(())
            }
            Ok(HostReadiness::Pending) => {
                debug!("waiting for the host session");
                Ok(())
            }
            Err(e) => self.host_failed(e.to_string()),
        }
    }

    fn host_failed(&mut self, reason: String) -> ScanResult<()> {
        self.stop_host();
        match self.policy {
            HostUnavailablePolicy::Simulate => {
                warn!(reason = %reason, "host session unavailable, switching to simulated capture");
                self.simulated = true;
                self.push(ScanEvent::guidance(GUIDANCE_SIMULATED));
                self.enter_scanning(ScanTransition::HostReady);
                Ok(())
            }
            HostUnavailablePolicy::Fail => {
                warn!(reason = %reason, "host session unavailable");
                if let Some(next) = self.state.next(ScanTransition::HostUnavailable) {
                    self.apply(next);
                }
                self.push(ScanEvent::error(format!("AR session unavailable: {reason}")));
                self.push(ScanEvent::status(ScanStatus::Failed));
                Err(ScanError::SessionUnavailable(reason))
            }
        }
    }

    fn enter_scanning(&mut self, transition: ScanTransition) {
        if let Some(next) = self.state.next(transition) {
            self.apply(next);
            self.push(ScanEvent::status(ScanStatus::Started));
            self.push(ScanEvent::guidance(GUIDANCE_START));
        }
    }

    fn stop_host(&mut self) {
        if self.host_active {
            self.host.stop();
            self.host_active = false;
        }
    }

    fn cancel_export(&mut self) {
        if let Some(token) = self.export_cancel.take() {
            token.cancel();
            debug!("in-flight export cancelled");
        }
    }

    fn clear_capture(&mut self) {
        self.cloud.clear();
        self.anchors.clear();
        self.quality.reset();
        self.object_detected = false;
    }

    fn report_progress(&mut self) {
        let quality = self.quality.update(&CoverageSample {
            progress: self.cloud.progress(),
            anchor_count: self.anchors.len(),
            mean_confidence: self.cloud.mean_confidence(),
        });
        self.push(ScanEvent::progress(self.cloud.progress(), quality));
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state)
            .field("points", &self.cloud.len())
            .field("anchors", &self.anchors.len())
            .field("quality", &self.quality.current())
            .field("simulated", &self.simulated)
            .finish()
    }
}
