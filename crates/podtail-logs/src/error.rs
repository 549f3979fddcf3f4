use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("opening log stream")]
    Open(#[source] kube::Error),

    #[error("reading log stream")]
    Read(#[source] std::io::Error),
}

impl TailError {
    /// The pod or container no longer exists, so reconnecting is pointless
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Open(kube::Error::Api(resp)) if resp.code == 404)
    }
}
