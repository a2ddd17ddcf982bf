//! Notice recording.
//!
//! Handlers report what they observed through a [`Recorder`]. Recording is
//! fire-and-forget: it must not block and cannot fail.

use chrono::{DateTime, Utc};
use informer::ObjectKey;
use serde::Serialize;
use tracing::{info, warn};

/// A single observation about a cached object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Object the notice is about
    pub object: ObjectKey,
    /// Kind of that object
    pub kind: String,
    /// Short machine-readable reason, e.g. `Added`
    pub reason: String,
    /// Human-readable detail
    pub message: String,
    /// When the notice was recorded
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    /// Creates a notice stamped with the current time.
    pub fn new(
        object: ObjectKey,
        kind: &str,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            object,
            kind: kind.to_string(),
            reason: reason.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Sink for notices.
pub trait Recorder: Send + Sync {
    /// Records `notice`.
    fn record(&self, notice: Notice);
}

/// Emits every notice as a structured `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingRecorder {
    component: String,
}

impl TracingRecorder {
    /// Creates a recorder whose events carry `component` as their source.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl Recorder for TracingRecorder {
    fn record(&self, notice: Notice) {
        match serde_json::to_string(&notice) {
            Ok(json) => info!(
                component = %self.component,
                kind = %notice.kind,
                object = %notice.object,
                reason = %notice.reason,
                notice = %json,
                "{}",
                notice.message
            ),
            Err(e) => warn!(
                component = %self.component,
                object = %notice.object,
                "Failed to serialize notice: {}",
                e
            ),
        }
    }
}
