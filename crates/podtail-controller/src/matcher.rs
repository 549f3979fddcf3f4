use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use podtail_types::{ContainerSpec, PodSnapshot};

/// What a matcher is asked about
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    Pod(&'a PodSnapshot),
    Container(&'a ContainerSpec),
}

/// Boolean predicate over pod or container metadata.
///
/// Must be pure: the controller evaluates it on every event, from several
/// tasks at once.
pub trait Matcher: Send + Sync + fmt::Debug + 'static {
    fn matches(&self, target: Target<'_>) -> bool;
}

/// Matches every pod and container
#[derive(Clone, Copy, Debug, Default)]
pub struct MatchAll;

impl Matcher for MatchAll {
    fn matches(&self, _target: Target<'_>) -> bool {
        true
    }
}

/// Matches nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct MatchNone;

impl Matcher for MatchNone {
    fn matches(&self, _target: Target<'_>) -> bool {
        false
    }
}

/// Compiled name patterns and label selectors.
///
/// A pod matches if its name matches any pod pattern, any configured label
/// pair is present on it, or its namespace is listed. A container matches if
/// its name matches any container pattern. An empty matcher matches nothing.
#[derive(Clone, Default)]
pub struct PatternMatcher {
    /// Pod name patterns
    pods: Vec<Regex>,

    /// Container name patterns
    containers: Vec<Regex>,

    /// Exact label pairs
    labels: BTreeMap<String, String>,

    /// Namespaces matched wholesale
    namespaces: HashSet<String>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pod name pattern
    pub fn with_pod(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pods.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a container name pattern
    pub fn with_container(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.containers.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a `key=value` label requirement
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Match every pod in `namespace`
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Check if matcher has no rules (matches nothing)
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
            && self.containers.is_empty()
            && self.labels.is_empty()
            && self.namespaces.is_empty()
    }

    fn matches_pod(&self, pod: &PodSnapshot) -> bool {
        if self.namespaces.contains(&pod.namespace) {
            return true;
        }

        if self
            .labels
            .iter()
            .any(|(k, v)| pod.labels.get(k).is_some_and(|actual| actual == v))
        {
            return true;
        }

        self.pods.iter().any(|re| re.is_match(&pod.name))
    }

    fn matches_container(&self, container: &ContainerSpec) -> bool {
        self.containers.iter().any(|re| re.is_match(&container.name))
    }
}

impl Matcher for PatternMatcher {
    fn matches(&self, target: Target<'_>) -> bool {
        match target {
            Target::Pod(pod) => self.matches_pod(pod),
            Target::Container(container) => self.matches_container(container),
        }
    }
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns = |res: &[Regex]| res.iter().map(|r| r.as_str().to_string()).collect::<Vec<_>>();
        f.debug_struct("PatternMatcher")
            .field("pods", &patterns(&self.pods))
            .field("containers", &patterns(&self.containers))
            .field("labels", &self.labels)
            .field("namespaces", &self.namespaces)
            .finish()
    }
}
