//! Kubernetes client for podtail
//!
//! This crate loads kubeconfig contexts, converts pods into the snapshots the
//! controller works with, and provides the list-then-watch pod source.

mod client;
mod snapshot;
mod watch;

pub use client::KubeClient;
pub use snapshot::pod_snapshot;
pub use watch::KubeWatchSource;
