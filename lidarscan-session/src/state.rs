//! Scan lifecycle states and the transition table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanState {
    Idle,
    Initializing,
    Scanning,
    Paused,
    Exporting,
    Completed,
    Cancelled,
    Failed,
}

/// Events that move a session between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTransition {
    Initialize,
    /// `startScan` while the host is still coming up, or already scanning
    Start,
    HostReady,
    HostUnavailable,
    Pause,
    Resume,
    Complete,
    ExportFinished,
    ExportFailed,
    Cancel,
    Reset,
}

impl ScanState {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Initializing => "initializing",
            ScanState::Scanning => "scanning",
            ScanState::Paused => "paused",
            ScanState::Exporting => "exporting",
            ScanState::Completed => "completed",
            ScanState::Cancelled => "cancelled",
            ScanState::Failed => "failed",
        }
    }

    /// Completed, cancelled and failed sessions only leave through a reset
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Completed | ScanState::Cancelled | ScanState::Failed)
    }

    /// Only a scanning session ingests frames and anchors
    pub fn accepts_capture(self) -> bool {
        self == ScanState::Scanning
    }

    /// Target state of `transition`, or `None` if it is not allowed here
    pub fn next(self, transition: ScanTransition) -> Option<ScanState> {
        use ScanState::*;
        use ScanTransition as T;

        match (self, transition) {
            (_, T::Reset) => Some(Idle),
            (Idle, T::Cancel) => Some(Idle),
            (_, T::Cancel) => Some(Cancelled),

            (Idle, T::Initialize) => Some(Initializing),
            (Initializing, T::Start) => Some(Initializing),
            (Scanning, T::Start) => Some(Scanning),
            (Initializing, T::HostReady) => Some(Scanning),
            (Initializing, T::HostUnavailable) => Some(Failed),

            (Scanning, T::Pause) => Some(Paused),
            (Paused, T::Resume) => Some(Scanning),
            (Scanning | Paused, T::Complete) => Some(Exporting),

            (Exporting, T::ExportFinished) => Some(Completed),
            (Exporting, T::ExportFailed) => Some(Failed),

            _ => None,
        }
    }
}

impl Default for ScanState {
    fn default() -> Self {
        ScanState::Idle
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
