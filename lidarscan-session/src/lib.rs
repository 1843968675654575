//! # lidarscan session
//!
//! The scan lifecycle: a state machine over one [`ScanSession`], the
//! single-subscriber event stream, the injected host AR session and the
//! method-call command surface used by UI layers.
//!
//! ```text
//!  control context            capture context (host)
//!  ScanController ──┐     ┌── CaptureHandle
//!                   ▼     ▼
//!              Mutex<ScanSession> ──events──▶ EventEmitter ──▶ EventSink
//!                   │
//!                   └─ begin_export ──▶ export worker ──▶ finish_export
//! ```

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod host;
pub mod session;
pub mod state;

pub use command::{CommandReply, ScanCommand};
pub use config::{ScannerConfig, DEFAULT_CONFIG_PATH};
pub use controller::{CaptureHandle, ScanController};
pub use error::{ConfigLoadError, ScanError, ScanResult};
pub use events::{ChannelSink, EventEmitter, EventSink, ScanEvent, ScanStatus};
pub use host::{
    DeviceCapability, HostCall, HostError, HostReadiness, HostSession, HostUnavailablePolicy,
    SimulatedHost, StaticCapability,
};
pub use session::{PointRecord, ScanSession, SessionInfo};
pub use state::{ScanState, ScanTransition};

// Re-exported so hosts only need this crate
pub use lidarscan_capture::{DepthFrame, SamplerConfig, SimulatedDepthSource, SimulationConfig};
pub use lidarscan_core::{AnchorId, MeshAnchor};
pub use lidarscan_io::ModelFormat;
pub use lidarscan_reconstruction::{ExportConfig, ExportPipeline, ExportResult};
