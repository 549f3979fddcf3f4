//! Container discovery and tail session control for podtail
//!
//! This crate turns a stream of pod lifecycle events into per-container
//! "start tailing" / "stop tailing" decisions. It owns the registry of active
//! tailers and talks to the cluster, the log streams and the embedding
//! application only through the traits re-exported here.

mod callbacks;
mod controller;
mod error;
mod matcher;
mod options;
mod policy;
mod registry;
mod tailer;
mod timestamp;
mod watch;

#[cfg(test)]
mod testing;

pub use callbacks::{Callbacks, NoopCallbacks};
pub use controller::Controller;
pub use error::Cancelled;
pub use matcher::{MatchAll, MatchNone, Matcher, PatternMatcher, Target};
pub use options::{ControllerOptions, ReplayFrom};
pub use policy::should_include_container;
pub use tailer::{ErrorSink, EventSink, Tailer, TailerFactory};
pub use timestamp::{INITIAL_SKEW_BUFFER, resolve_start_timestamp};
pub use watch::{ListItem, PodEventHandler, PodListing, WatchSource};

// Re-export types used in our public API
pub use podtail_types::{ContainerKey, ContainerSpec, LogEvent, PodSnapshot};
