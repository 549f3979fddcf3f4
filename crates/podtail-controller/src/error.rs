use thiserror::Error;

/// Returned (wrapped in `anyhow::Error`) when `Controller::run` stops because
/// its cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("controller cancelled")]
pub struct Cancelled;
