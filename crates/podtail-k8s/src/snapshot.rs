use k8s_openapi::api::core::v1::{Container, ContainerStatus, Pod};

use podtail_types::{ContainerSpec, ContainerState, ContainerStatusInfo, PodPhase, PodSnapshot};

/// Copy the fields the controller needs out of a k8s Pod
pub fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let mut snapshot = PodSnapshot::new(
        pod.metadata.name.clone().unwrap_or_default(),
        pod.metadata.namespace.clone().unwrap_or_default(),
    );
    snapshot.uid = pod.metadata.uid.clone();
    snapshot.labels = pod.metadata.labels.clone().unwrap_or_default();

    if let Some(spec) = &pod.spec {
        snapshot.node_name = spec.node_name.clone();
        snapshot.init_containers = spec
            .init_containers
            .iter()
            .flatten()
            .map(|c| container_spec(c, true))
            .collect();
        snapshot.containers = spec
            .containers
            .iter()
            .map(|c| container_spec(c, false))
            .collect();
    }

    if let Some(status) = &pod.status {
        snapshot.phase = status
            .phase
            .as_deref()
            .map(PodPhase::from)
            .unwrap_or_default();
        snapshot.init_container_statuses = status
            .init_container_statuses
            .iter()
            .flatten()
            .map(container_status)
            .collect();
        snapshot.container_statuses = status
            .container_statuses
            .iter()
            .flatten()
            .map(container_status)
            .collect();
    }

    snapshot
}

fn container_spec(container: &Container, init: bool) -> ContainerSpec {
    ContainerSpec {
        name: container.name.clone(),
        image: container.image.clone(),
        init,
    }
}

fn container_status(status: &ContainerStatus) -> ContainerStatusInfo {
    let state = status.state.as_ref().and_then(|s| {
        if let Some(running) = &s.running {
            Some(ContainerState::Running {
                started_at: running.started_at.as_ref().map(|t| t.0),
            })
        } else if let Some(terminated) = &s.terminated {
            Some(ContainerState::Terminated {
                exit_code: terminated.exit_code,
                reason: terminated.reason.clone(),
            })
        } else {
            s.waiting.as_ref().map(|waiting| ContainerState::Waiting {
                reason: waiting.reason.clone(),
            })
        }
    });

    ContainerStatusInfo {
        name: status.name.clone(),
        state,
        ready: status.ready,
        restart_count: status.restart_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::api::core::v1::{
        ContainerState as K8sContainerState, ContainerStateRunning, ContainerStateWaiting,
        PodSpec, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use std::collections::BTreeMap;

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some("busybox".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_snapshot() {
        let started = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("p1".to_string()),
                namespace: Some("ns1".to_string()),
                uid: Some("uid-1".to_string()),
                labels: Some(BTreeMap::from([("app".to_string(), "web".to_string())])),
                ..Default::default()
            },
            spec: Some(PodSpec {
                init_containers: Some(vec![container("init-a")]),
                containers: vec![container("c1"), container("c2")],
                node_name: Some("node-1".to_string()),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                init_container_statuses: Some(vec![ContainerStatus {
                    name: "init-a".to_string(),
                    state: Some(K8sContainerState {
                        waiting: Some(ContainerStateWaiting {
                            reason: Some("PodInitializing".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                container_statuses: Some(vec![
                    ContainerStatus {
                        name: "c1".to_string(),
                        ready: true,
                        restart_count: 2,
                        state: Some(K8sContainerState {
                            running: Some(ContainerStateRunning {
                                started_at: Some(Time(started)),
                            }),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ContainerStatus {
                        name: "c2".to_string(),
                        state: Some(K8sContainerState::default()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        };

        let snapshot = pod_snapshot(&pod);
        assert_eq!(snapshot.name, "p1");
        assert_eq!(snapshot.namespace, "ns1");
        assert_eq!(snapshot.uid.as_deref(), Some("uid-1"));
        assert_eq!(snapshot.labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(snapshot.node_name.as_deref(), Some("node-1"));
        assert_eq!(snapshot.phase, PodPhase::Running);

        assert_eq!(snapshot.init_containers.len(), 1);
        assert!(snapshot.init_containers[0].init);
        assert_eq!(snapshot.containers[1].name, "c2");
        assert!(!snapshot.containers[1].init);

        assert_eq!(
            snapshot.init_container_statuses[0].state,
            Some(ContainerState::Waiting {
                reason: Some("PodInitializing".to_string())
            })
        );
        assert_eq!(snapshot.container_statuses[0].running_since(), Some(started));
        assert!(snapshot.container_statuses[0].ready);
        assert_eq!(snapshot.container_statuses[0].restart_count, 2);
        // An empty state object means the kubelet reported nothing yet
        assert_eq!(snapshot.container_statuses[1].state, None);
    }

    #[test]
    fn test_pod_without_spec_or_status() {
        let snapshot = pod_snapshot(&Pod::default());
        assert_eq!(snapshot.phase, PodPhase::Unknown);
        assert!(snapshot.containers.is_empty());
        assert!(snapshot.container_statuses.is_empty());
    }
}
