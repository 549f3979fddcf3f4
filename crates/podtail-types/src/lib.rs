//! Shared types for podtail
//!
//! This crate contains the pod and container snapshots the controller reasons
//! about, and the log events produced by tailing sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Kubernetes Resource Types
// ============================================================================

/// Identity of a single tailing session: (namespace, pod, container)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerKey {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl ContainerKey {
    pub fn new(pod: &PodSnapshot, container: &ContainerSpec) -> Self {
        Self {
            namespace: pod.namespace.clone(),
            pod: pod.name.clone(),
            container: container.name.clone(),
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.pod, self.container)
    }
}

/// Point-in-time copy of a pod, as delivered by a watch source
#[derive(Clone, Debug, PartialEq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub node_name: Option<String>,
    pub phase: PodPhase,
    pub init_containers: Vec<ContainerSpec>,
    pub containers: Vec<ContainerSpec>,
    pub init_container_statuses: Vec<ContainerStatusInfo>,
    pub container_statuses: Vec<ContainerStatusInfo>,
}

impl PodSnapshot {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: None,
            labels: BTreeMap::new(),
            node_name: None,
            phase: PodPhase::Unknown,
            init_containers: Vec::new(),
            containers: Vec::new(),
            init_container_statuses: Vec::new(),
            container_statuses: Vec::new(),
        }
    }

    /// Init container statuses followed by regular container statuses
    pub fn all_statuses(&self) -> impl Iterator<Item = &ContainerStatusInfo> {
        self.init_container_statuses
            .iter()
            .chain(self.container_statuses.iter())
    }

    /// All statuses reported for the container with the given name
    pub fn statuses_for<'a>(
        &'a self,
        container: &'a str,
    ) -> impl Iterator<Item = &'a ContainerStatusInfo> {
        self.all_statuses().filter(move |s| s.name == container)
    }

    /// Find a regular (non-init) container spec by name
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    /// Whether containers of a pod in this phase may still produce logs
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl From<&str> for PodPhase {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// Container declared in a pod spec
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: Option<String>,
    /// Declared under `initContainers`
    pub init: bool,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            init: false,
        }
    }

    pub fn init(name: impl Into<String>) -> Self {
        Self {
            init: true,
            ..Self::new(name)
        }
    }
}

/// Lifecycle state reported by the kubelet for a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerState {
    Waiting {
        reason: Option<String>,
    },
    Running {
        started_at: Option<DateTime<Utc>>,
    },
    Terminated {
        exit_code: i32,
        reason: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerStatusInfo {
    pub name: String,
    /// `None` when the kubelet has not reported any state yet
    pub state: Option<ContainerState>,
    pub ready: bool,
    pub restart_count: i32,
}

impl ContainerStatusInfo {
    pub fn new(name: impl Into<String>, state: Option<ContainerState>) -> Self {
        Self {
            name: name.into(),
            state,
            ready: false,
            restart_count: 0,
        }
    }

    pub fn running(name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self::new(
            name,
            Some(ContainerState::Running {
                started_at: Some(started_at),
            }),
        )
    }

    pub fn waiting(name: impl Into<String>) -> Self {
        Self::new(name, Some(ContainerState::Waiting { reason: None }))
    }

    /// Start time if this status is in the running state
    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            Some(ContainerState::Running { started_at }) => *started_at,
            _ => None,
        }
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    #[default]
    Unknown,
}

impl LogLevel {
    /// Parse log level from common formats
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" | "trc" | "trce" => Self::Trace,
            "debug" | "dbg" | "debg" => Self::Debug,
            "info" | "inf" | "information" => Self::Info,
            "warn" | "warning" | "wrn" => Self::Warn,
            "error" | "err" | "erro" => Self::Error,
            "fatal" | "panic" | "critical" | "crit" | "ftl" => Self::Fatal,
            _ => Self::Unknown,
        }
    }
}

/// A single log line from one container
#[derive(Clone, Debug, Serialize)]
pub struct LogEvent {
    pub namespace: String,
    pub pod: String,
    pub container: String,

    /// Timestamp prefixed by the kubelet (if present)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Detected log level
    pub level: LogLevel,

    /// Log content with the timestamp prefix removed
    pub message: String,
}

impl LogEvent {
    pub fn new(key: &ContainerKey, message: String) -> Self {
        Self {
            namespace: key.namespace.clone(),
            pod: key.pod.clone(),
            container: key.container.clone(),
            timestamp: None,
            level: LogLevel::Unknown,
            message,
        }
    }
}
