//! Host AR capabilities injected into the scan controller
//!
//! The host owns the platform camera/AR session. The controller drives it
//! through [`HostSession`] and the host feeds frames and anchors back through
//! a [`CaptureHandle`](crate::CaptureHandle). `HostSession` methods are called
//! while the session lock is held, so they must not call back into the
//! controller synchronously; report late readiness from another thread.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Whether the host session is usable as soon as `start` returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostReadiness {
    Ready,
    /// The host will report readiness later via `host_ready`/`host_unavailable`
    Pending,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("AR session unavailable: {0}")]
    Unavailable(String),

    #[error("AR session error: {0}")]
    Failed(String),
}

/// Lifecycle of the platform AR session
pub trait HostSession: Send {
    fn start(&mut self) -> Result<HostReadiness, HostError>;

    fn pause(&mut self) -> Result<(), HostError>;

    fn resume(&mut self) -> Result<(), HostError>;

    /// Release camera and session resources; must be idempotent
    fn stop(&mut self);
}

/// Whether the device has the depth hardware scanning needs
pub trait DeviceCapability: Send + Sync {
    fn supports_depth(&self) -> bool;
}

/// A fixed answer to the capability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticCapability(pub bool);

impl DeviceCapability for StaticCapability {
    fn supports_depth(&self) -> bool {
        self.0
    }
}

/// What to do when the AR session cannot start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostUnavailablePolicy {
    /// Move the session to `Failed`
    #[default]
    Fail,
    /// Keep scanning in simulated mode without the host
    Simulate,
}

/// A call made on a [`SimulatedHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Start,
    Pause,
    Resume,
    Stop,
}

/// In-process host used by the demo binary and tests
///
/// It records every call so callers can check what the controller did with
/// the session.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    readiness: HostReadiness,
    unavailable: Option<String>,
    calls: Arc<Mutex<Vec<HostCall>>>,
}

impl SimulatedHost {
    /// A host that is ready immediately
    pub fn new() -> Self {
        Self {
            readiness: HostReadiness::Ready,
            unavailable: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A host that reports readiness later
    pub fn pending() -> Self {
        Self {
            readiness: HostReadiness::Pending,
            ..Self::new()
        }
    }

    /// A host whose session never starts
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Shared log of calls, still readable after the host is moved into a controller
    pub fn call_log(&self) -> Arc<Mutex<Vec<HostCall>>> {
        self.calls.clone()
    }

    fn record(&self, call: HostCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSession for SimulatedHost {
    fn start(&mut self) -> Result<HostReadiness, HostError> {
        self.record(HostCall::Start);
        match &self.unavailable {
            Some(reason) => Err(HostError::Unavailable(reason.clone())),
            None => Ok(self.readiness),
        }
    }

    fn pause(&mut self) -> Result<(), HostError> {
        self.record(HostCall::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), HostError> {
        self.record(HostCall::Resume);
        Ok(())
    }

    fn stop(&mut self) {
        self.record(HostCall::Stop);
    }
}
