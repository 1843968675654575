//! Events pushed from the scan session to the UI layer
//!
//! The emitter holds at most one subscriber, and only weakly: a dropped
//! subscriber silently turns emission into a no-op. Emission never buffers,
//! blocks on the subscriber's behalf, or fails.

use lidarscan_reconstruction::ExportResult;
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Arc, Mutex, Weak};

/// Lifecycle milestones reported by `scanStatus` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Started,
    Paused,
    Resumed,
    Exporting,
    Completed,
    Cancelled,
    Failed,
    Reset,
}

/// One message on the event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanEvent {
    ScanStatus { status: ScanStatus },
    ScanProgress {
        /// Point progress towards the cloud's soft target, in `[0, 1]`
        progress: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<f32>,
    },
    Guidance { message: String },
    Error { message: String },
    ExportComplete { result: ExportResult },
}

impl ScanEvent {
    pub fn status(status: ScanStatus) -> Self {
        ScanEvent::ScanStatus { status }
    }

    pub fn progress(progress: f32, quality: f32) -> Self {
        ScanEvent::ScanProgress {
            progress: progress.clamp(0.0, 1.0),
            quality: Some(quality.clamp(0.0, 1.0)),
        }
    }

    pub fn guidance(message: impl Into<String>) -> Self {
        ScanEvent::Guidance { message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ScanEvent::Error { message: message.into() }
    }

    /// Wire name of the event, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::ScanStatus { .. } => "scanStatus",
            ScanEvent::ScanProgress { .. } => "scanProgress",
            ScanEvent::Guidance { .. } => "guidance",
            ScanEvent::Error { .. } => "error",
            ScanEvent::ExportComplete { .. } => "exportComplete",
        }
    }
}

/// Receiver of scan events
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &ScanEvent);
}

/// Single-subscriber broadcast point
#[derive(Default)]
pub struct EventEmitter {
    subscriber: Mutex<Option<Weak<dyn EventSink>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current subscriber
    pub fn attach<S: EventSink + 'static>(&self, sink: &Arc<S>) {
        let sink: Arc<dyn EventSink> = sink.clone();
        let weak = Arc::downgrade(&sink);
        *self.slot() = Some(weak);
    }

    pub fn detach(&self) {
        *self.slot() = None;
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot().as_ref().and_then(Weak::upgrade).is_some()
    }

    pub fn emit(&self, event: &ScanEvent) {
        // Upgrade under the lock, deliver outside it
        let sink = self.slot().as_ref().and_then(Weak::upgrade);
        if let Some(sink) = sink {
            sink.on_event(event);
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Weak<dyn EventSink>>> {
        self.subscriber.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("has_subscriber", &self.has_subscriber())
            .finish()
    }
}

/// Forwards events into an mpsc channel
pub struct ChannelSink {
    tx: Mutex<mpsc::Sender<ScanEvent>>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx: Mutex::new(tx) }), rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: &ScanEvent) {
        if let Ok(tx) = self.tx.lock() {
            // A closed receiver just means nobody is listening any more
            let _ = tx.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let status = serde_json::to_value(ScanEvent::status(ScanStatus::Started)).unwrap();
        assert_eq!(status, json!({"type": "scanStatus", "status": "started"}));

        let guidance = serde_json::to_value(ScanEvent::guidance("Scan paused")).unwrap();
        assert_eq!(guidance, json!({"type": "guidance", "message": "Scan paused"}));

        let progress = serde_json::to_value(ScanEvent::ScanProgress {
            progress: 0.5,
            quality: None,
        })
        .unwrap();
        assert_eq!(progress, json!({"type": "scanProgress", "progress": 0.5}));

        let error = ScanEvent::error("boom");
        assert_eq!(serde_json::to_value(&error).unwrap()["type"], error.kind());
    }

    #[test]
    fn test_progress_is_clamped() {
        match ScanEvent::progress(1.7, -0.2) {
            ScanEvent::ScanProgress { progress, quality } => {
                assert_eq!(progress, 1.0);
                assert_eq!(quality, Some(0.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_emit_without_subscriber_is_noop() {
        let emitter = EventEmitter::new();
        assert!(!emitter.has_subscriber());
        emitter.emit(&ScanEvent::guidance("nobody listens"));
    }

    #[test]
    fn test_attach_replaces_subscriber() {
        let emitter = EventEmitter::new();
        let (first, first_rx) = ChannelSink::new();
        let (second, second_rx) = ChannelSink::new();

        emitter.attach(&first);
        emitter.emit(&ScanEvent::guidance("one"));
        emitter.attach(&second);
        emitter.emit(&ScanEvent::guidance("two"));

        assert_eq!(first_rx.try_iter().count(), 1);
        assert_eq!(second_rx.try_iter().collect::<Vec<_>>(), vec![ScanEvent::guidance("two")]);

        emitter.detach();
        emitter.emit(&ScanEvent::guidance("three"));
        assert_eq!(second_rx.try_iter().count(), 0);
    }

    #[test]
    fn test_subscriber_is_held_weakly() {
        let emitter = EventEmitter::new();
        let (sink, rx) = ChannelSink::new();
        emitter.attach(&sink);
        assert!(emitter.has_subscriber());

        drop(sink);
        assert!(!emitter.has_subscriber());
        emitter.emit(&ScanEvent::guidance("dropped"));
        assert!(rx.try_recv().is_err());
    }
}
