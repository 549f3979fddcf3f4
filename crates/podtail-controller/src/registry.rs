use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use podtail_types::{ContainerKey, ContainerSpec, PodSnapshot};

use crate::tailer::Tailer;

/// A registered tailing session
pub(crate) struct Session {
    pub tailer: Arc<dyn Tailer>,
    /// Task driving `Tailer::run`
    pub task: JoinHandle<()>,
    pub pod: PodSnapshot,
    pub container: ContainerSpec,
}

/// Active sessions keyed by container identity.
///
/// One lock guards the whole map; callers hold the guard across
/// check-exists, gate and insert so those happen as one unit.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<ContainerKey, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, HashMap<ContainerKey, Session>> {
        self.sessions.lock()
    }

    pub fn keys(&self) -> Vec<ContainerKey> {
        let mut keys: Vec<_> = self.sessions.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}
