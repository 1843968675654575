//! Model export pipeline
//!
//! ```text
//! ExportRequest ──▶ Reconstructor ──▶ WriterRegistry ──▶ <output_dir>/scan_<timestamp>.<ext>
//!                        │ no anchors / error     ▲
//!                        └──▶ placeholder box ────┘
//! ```
//!
//! `export` never fails outright: when the real mesh cannot be produced the
//! placeholder is written instead and the result says so through
//! [`ExportResult::placeholder`] and [`ExportResult::error_message`]. Only a
//! failure to write anything at all yields `success == false`.

use crate::placeholder::{placeholder_mesh, DEFAULT_PLACEHOLDER_EDGE};
use crate::reconstruct::{AnchorMeshReconstructor, Reconstructor};
use chrono::{DateTime, Local};
use lidarscan_core::{CloudSnapshot, Error, MeshAnchor, Result, TriangleMesh};
use lidarscan_io::{ModelFormat, ModelStore, PlyWriter, WriterRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Prefix and timestamp layout of exported file names
pub const FILE_NAME_PATTERN: &str = "scan_%Y%m%d_%H%M%S";

/// Export settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory that receives model files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Format used when a command does not name one
    #[serde(default)]
    pub default_format: ModelFormat,

    /// Also write the captured points as `<model>.ply`
    #[serde(default)]
    pub write_point_cloud_sidecar: bool,

    /// Edge length of the placeholder box (meters)
    #[serde(default = "default_placeholder_edge")]
    pub placeholder_edge: f32,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("scans")
}

fn default_placeholder_edge() -> f32 {
    DEFAULT_PLACEHOLDER_EDGE
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            default_format: ModelFormat::default(),
            write_point_cloud_sidecar: false,
            placeholder_edge: default_placeholder_edge(),
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.placeholder_edge.is_finite() && self.placeholder_edge > 0.0) {
            return Err(Error::InvalidData(format!(
                "placeholder edge must be positive, got {}",
                self.placeholder_edge
            )));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidData("output directory is empty".to_string()));
        }
        Ok(())
    }
}

/// Everything the pipeline needs, detached from the live session
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub points: CloudSnapshot,
    pub anchors: Vec<MeshAnchor>,
    pub format: ModelFormat,
    pub captured_at: DateTime<Local>,
}

impl ExportRequest {
    pub fn new(points: CloudSnapshot, anchors: Vec<MeshAnchor>, format: ModelFormat) -> Self {
        Self {
            points,
            anchors,
            format,
            captured_at: Local::now(),
        }
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Local>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// File stem derived from the capture time
    pub fn file_stem(&self) -> String {
        self.captured_at.format(FILE_NAME_PATTERN).to_string()
    }
}

/// Outcome of an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub model_path: PathBuf,
    /// Format of the file actually written
    pub format: ModelFormat,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The file holds the placeholder box rather than scanned geometry
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default)]
    pub point_count: usize,
    #[serde(default)]
    pub anchor_count: usize,
}

impl ExportResult {
    fn failed(request: &ExportRequest, message: String) -> Self {
        Self {
            model_path: PathBuf::new(),
            format: request.format,
            success: false,
            error_message: Some(message),
            placeholder: false,
            point_count: request.points.len(),
            anchor_count: request.anchors.len(),
        }
    }
}

/// Result of an export that may have been cancelled
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Finished(ExportResult),
    Cancelled,
}

impl ExportOutcome {
    pub fn result(&self) -> Option<&ExportResult> {
        match self {
            ExportOutcome::Finished(result) => Some(result),
            ExportOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExportOutcome::Cancelled)
    }
}

/// Shared flag asking an in-flight export to stop before writing
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Reconstructs and writes scans into a [`ModelStore`]
pub struct ExportPipeline {
    config: ExportConfig,
    registry: WriterRegistry,
    store: ModelStore,
    reconstructor: Box<dyn Reconstructor>,
}

impl ExportPipeline {
    pub fn new(config: ExportConfig) -> Self {
        let store = ModelStore::new(config.output_dir.clone());
        Self {
            config,
            registry: WriterRegistry::with_defaults(),
            store,
            reconstructor: Box::new(AnchorMeshReconstructor::default()),
        }
    }

    pub fn with_registry(mut self, registry: WriterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_reconstructor(mut self, reconstructor: Box<dyn Reconstructor>) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn registry(&self) -> &WriterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WriterRegistry {
        &mut self.registry
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Run an export to completion on the calling thread
    pub fn export(&self, request: &ExportRequest) -> ExportResult {
        match self.export_with_cancel(request, &CancellationToken::new()) {
            ExportOutcome::Finished(result) => result,
            ExportOutcome::Cancelled => ExportResult::failed(request, "export cancelled".to_string()),
        }
    }

    /// Run an export, checking `cancel` before each file is written
    pub fn export_with_cancel(&self, request: &ExportRequest, cancel: &CancellationToken) -> ExportOutcome {
        if cancel.is_cancelled() {
            return ExportOutcome::Cancelled;
        }

        if let Err(e) = self.store.ensure_dir() {
            warn!(dir = %self.store.root().display(), error = %e, "cannot create model directory");
            return ExportOutcome::Finished(ExportResult::failed(
                request,
                format!("cannot create model directory: {e}"),
            ));
        }

        let stem = request.file_stem();
        let mut failure = None;

        if request.anchors.is_empty() {
            debug!("no mesh anchors captured, exporting placeholder");
        } else {
            match self.reconstructor.reconstruct(&request.points, &request.anchors) {
                Ok(mesh) => {
                    if cancel.is_cancelled() {
                        return ExportOutcome::Cancelled;
                    }
                    let path = self.store.unique_path(&stem, request.format);
                    match self.registry.write(&mesh, &path, request.format) {
                        Ok(()) => {
                            info!(
                                path = %path.display(),
                                format = %request.format,
                                reconstructor = self.reconstructor.name(),
                                vertices = mesh.vertex_count(),
                                faces = mesh.face_count(),
                                "model exported"
                            );
                            return ExportOutcome::Finished(self.finish(request, path, request.format, false, None));
                        }
                        Err(e) => {
                            remove_partial(&path);
                            failure = Some(format!("{} export failed: {e}", request.format));
                        }
                    }
                }
                Err(e) => failure = Some(format!("reconstruction failed: {e}")),
            }
        }

        if let Some(message) = &failure {
            warn!(error = %message, "falling back to placeholder model");
        }
        if cancel.is_cancelled() {
            return ExportOutcome::Cancelled;
        }

        let mesh = placeholder_mesh(&request.points, self.config.placeholder_edge);
        match self.write_placeholder(&mesh, &stem, request.format) {
            Ok((path, format)) => {
                info!(path = %path.display(), format = %format, "placeholder model exported");
                ExportOutcome::Finished(self.finish(request, path, format, true, failure))
            }
            Err(e) => {
                warn!(error = %e, "placeholder export failed");
                let message = match failure {
                    Some(first) => format!("{first}; placeholder export failed: {e}"),
                    None => format!("placeholder export failed: {e}"),
                };
                ExportOutcome::Finished(ExportResult::failed(request, message))
            }
        }
    }

    /// Run an export on a dedicated worker thread
    ///
    /// Cancelling `cancel` (or the returned task) stops the worker before it
    /// writes the next file.
    pub fn spawn(self: Arc<Self>, request: ExportRequest, cancel: CancellationToken) -> Result<ExportTask> {
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("lidarscan-export".to_string())
            .spawn(move || {
                let outcome = self.export_with_cancel(&request, &worker_cancel);
                // The receiver may already be gone if the task was dropped
                let _ = tx.send(outcome);
            })?;

        Ok(ExportTask {
            handle: Some(handle),
            result_rx: rx,
            cancel,
        })
    }

    /// Writes in the requested format when possible, otherwise as OBJ
    fn write_placeholder(&self, mesh: &TriangleMesh, stem: &str, requested: ModelFormat) -> Result<(PathBuf, ModelFormat)> {
        let mut last_error = None;
        for format in [requested, ModelFormat::Obj] {
            if !self.registry.supports(format) {
                continue;
            }
            let path = self.store.unique_path(stem, format);
            match self.registry.write(mesh, &path, format) {
                Ok(()) => return Ok((path, format)),
                Err(e) => {
                    remove_partial(&path);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            Error::UnsupportedFormat(format!("no writer available for {requested} or obj"))
        }))
    }

    fn finish(
        &self,
        request: &ExportRequest,
        model_path: PathBuf,
        format: ModelFormat,
        placeholder: bool,
        error_message: Option<String>,
    ) -> ExportResult {
        if self.config.write_point_cloud_sidecar && !request.points.is_empty() {
            let sidecar = model_path.with_extension("ply");
            if let Err(e) = PlyWriter::write_point_cloud(request.points.as_slice(), &sidecar) {
                warn!(path = %sidecar.display(), error = %e, "point cloud sidecar not written");
            }
        }

        ExportResult {
            model_path,
            format,
            success: true,
            error_message,
            placeholder,
            point_count: request.points.len(),
            anchor_count: request.anchors.len(),
        }
    }
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "could not remove partial export");
        }
    }
}

/// Handle to an export running on a worker thread
pub struct ExportTask {
    handle: Option<JoinHandle<()>>,
    result_rx: mpsc::Receiver<ExportOutcome>,
    cancel: CancellationToken,
}

impl ExportTask {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the worker to stop before writing any further file
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Non-blocking poll for the outcome
    pub fn try_result(&mut self) -> Option<Result<ExportOutcome>> {
        match self.result_rx.try_recv() {
            Ok(outcome) => {
                self.join();
                Some(Ok(outcome))
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.join();
                Some(Err(Error::Algorithm("export worker terminated without a result".to_string())))
            }
        }
    }

    /// Block until the worker delivers its outcome
    pub fn wait(mut self) -> Result<ExportOutcome> {
        let outcome = self
            .result_rx
            .recv()
            .map_err(|_| Error::Algorithm("export worker terminated without a result".to_string()));
        self.join();
        outcome
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("export worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for ExportTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportTask")
            .field("running", &self.handle.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
