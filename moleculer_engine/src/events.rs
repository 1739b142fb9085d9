//! Events emitted by the engine towards the load-test harness.

use std::sync::Arc;

/// Histogram emitted after a broker started.
pub const SPAWN_RESPONSE_TIME: &str = "spawn.response_time";

/// Histogram emitted after a broker stopped cleanly.
pub const STOP_RESPONSE_TIME: &str = "stop.response_time";

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A scenario iteration was initialized
    Started,
    /// A timing sample in milliseconds
    Histogram { name: String, value: f64 },
    /// A failed spawn or stop, tagged with the node identifier
    Error { code: String },
}

impl EngineEvent {
    pub fn histogram(name: impl Into<String>, value: f64) -> Self {
        EngineEvent::Histogram {
            name: name.into(),
            value,
        }
    }

    pub fn error(code: impl Into<String>) -> Self {
        EngineEvent::Error { code: code.into() }
    }
}

/// Receiver of lifecycle and metric events.
///
/// Implementations are shared by every iteration of every scenario, so
/// `emit` takes `&self` and must be cheap.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: EngineEvent) {
        (**self).emit(event)
    }
}
