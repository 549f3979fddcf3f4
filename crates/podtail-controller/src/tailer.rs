use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use podtail_types::{ContainerSpec, LogEvent, PodSnapshot};

/// Receives every log line a tailer reads
pub type EventSink = Arc<dyn Fn(LogEvent) + Send + Sync>;

/// Receives failures reported by a running tailer
pub type ErrorSink = Box<dyn Fn(anyhow::Error) + Send + Sync>;

/// A live log stream for one container
pub trait Tailer: Send + Sync + 'static {
    /// Stream until stopped or until the stream ends for good.
    /// Failures go to `on_error`; retrying is up to the implementation.
    fn run(&self, on_error: ErrorSink) -> BoxFuture<'_, ()>;

    /// Stop streaming. Safe to call more than once, and before `run`.
    fn stop(&self);
}

/// Builds tailers for containers selected by the controller
pub trait TailerFactory: Send + Sync + 'static {
    /// `since` is `None` when the whole available log should be replayed
    fn create(
        &self,
        pod: &PodSnapshot,
        container: &ContainerSpec,
        since: Option<DateTime<Utc>>,
        events: EventSink,
    ) -> Arc<dyn Tailer>;
}
