use chrono::{DateTime, Duration, Utc};

use podtail_types::{ContainerSpec, PodSnapshot};

use crate::options::ReplayFrom;

/// How far before "now" initial-discovery sessions start, to absorb clock skew
/// between this process and the log backend
pub const INITIAL_SKEW_BUFFER: Duration = Duration::seconds(5);

/// Resolve where a new session starts reading.
///
/// Returns `None` when no start point can be determined yet, in which case the
/// session must not be started. `Some(None)` means "replay everything".
pub fn resolve_start_timestamp(
    replay: ReplayFrom,
    pod: &PodSnapshot,
    container: &ContainerSpec,
    initial: bool,
) -> Option<Option<DateTime<Utc>>> {
    resolve_at(replay, pod, container, initial, Utc::now())
}

pub(crate) fn resolve_at(
    replay: ReplayFrom,
    pod: &PodSnapshot,
    container: &ContainerSpec,
    initial: bool,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    match replay {
        ReplayFrom::Start => Some(None),
        ReplayFrom::At(instant) => Some(Some(instant)),
        ReplayFrom::Now if initial => Some(Some(now - INITIAL_SKEW_BUFFER)),
        // Duplicate running entries may disagree; the earliest wins
        ReplayFrom::Now => pod
            .statuses_for(&container.name)
            .filter_map(|status| status.running_since())
            .min()
            .map(Some),
    }
}
