use podtail_types::{ContainerSpec, LogEvent, PodSnapshot};

/// Capabilities the controller invokes on its embedder.
///
/// Methods are called from namespace watch tasks (`on_enter`, `on_exit`,
/// `on_nothing_discovered`) and from tailer tasks (`on_event`, `on_error`), so
/// implementations must tolerate concurrent calls. `on_enter` and `on_exit`
/// run while the session registry is locked and must not call back into the
/// controller.
pub trait Callbacks: Send + Sync + 'static {
    /// A log line was read from a container
    fn on_event(&self, _event: LogEvent) {}

    /// A session is about to start; returning `false` vetoes it.
    ///
    /// Only called once the start point is known, so returning `true` always
    /// registers a session and `on_exit` follows when it is stopped.
    fn on_enter(&self, _pod: &PodSnapshot, _container: &ContainerSpec, _initial: bool) -> bool {
        true
    }

    /// A session was stopped
    fn on_exit(&self, _pod: &PodSnapshot, _container: &ContainerSpec) {}

    /// A running session reported a failure
    fn on_error(&self, _pod: &PodSnapshot, _container: &ContainerSpec, _error: &anyhow::Error) {}

    /// The startup listing found nothing to tail in any namespace
    fn on_nothing_discovered(&self) {}
}

/// Accepts every session and ignores every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallbacks;

impl Callbacks for NoopCallbacks {}
