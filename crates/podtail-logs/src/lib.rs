//! Log streaming for podtail
//!
//! This crate provides the kube-backed tailer the controller starts for each
//! container, and the parser that turns raw log lines into events.

mod backoff;
mod error;
mod parser;
mod stream;

pub use backoff::Backoff;
pub use error::TailError;
pub use parser::LogParser;
pub use stream::{KubeTailer, KubeTailerFactory};

// Re-export types used in our public API
pub use podtail_types::{LogEvent, LogLevel};
