use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::matcher::{MatchAll, MatchNone, Matcher};

/// Where a new session starts reading the container log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReplayFrom {
    /// Everything the log backend still has
    Start,
    /// A fixed instant, the same for every session
    At(DateTime<Utc>),
    /// Only new lines (with a small buffer for clock skew on initial discovery)
    #[default]
    Now,
}

/// Static controller configuration
#[derive(Clone)]
pub struct ControllerOptions {
    pub namespaces: Vec<String>,
    pub inclusion: Arc<dyn Matcher>,
    pub exclusion: Arc<dyn Matcher>,
    /// Only tail containers with exactly this name
    pub container_name: Option<String>,
    pub replay: ReplayFrom,
}

impl ControllerOptions {
    /// Include everything in the given namespaces, exclude nothing
    pub fn new(namespaces: Vec<String>) -> Self {
        Self {
            namespaces,
            inclusion: Arc::new(MatchAll),
            exclusion: Arc::new(MatchNone),
            container_name: None,
            replay: ReplayFrom::Now,
        }
    }

    pub fn with_inclusion(mut self, matcher: impl Matcher) -> Self {
        self.inclusion = Arc::new(matcher);
        self
    }

    pub fn with_exclusion(mut self, matcher: impl Matcher) -> Self {
        self.exclusion = Arc::new(matcher);
        self
    }

    pub fn with_container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    pub fn with_replay(mut self, replay: ReplayFrom) -> Self {
        self.replay = replay;
        self
    }
}

impl std::fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("namespaces", &self.namespaces)
            .field("inclusion", &self.inclusion)
            .field("exclusion", &self.exclusion)
            .field("container_name", &self.container_name)
            .field("replay", &self.replay)
            .finish()
    }
}
