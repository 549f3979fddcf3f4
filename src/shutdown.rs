use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    Sigterm,
}

/// Cancel `token` on Ctrl+C or SIGTERM, whichever comes first
pub async fn cancel_on_signal(token: CancellationToken) -> ShutdownReason {
    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => ShutdownReason::CtrlC,
        _ = wait_sigterm() => ShutdownReason::Sigterm,
    };
    tracing::info!(reason = ?reason, "shutting down");
    token.cancel();
    reason
}

#[cfg(unix)]
async fn wait_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        // Unable to register: never fire
        Err(_) => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn wait_sigterm() {
    std::future::pending().await
}
