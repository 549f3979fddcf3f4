use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, pin_mut};
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;

use podtail_controller::{PodEventHandler, PodListing, WatchSource};
use podtail_types::PodSnapshot;

use crate::snapshot::pod_snapshot;

/// Pod source backed by the Kubernetes API: a plain list, then a watcher.
///
/// The empty namespace stands for all namespaces.
pub struct KubeWatchSource {
    client: Client,
}

impl KubeWatchSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Pod> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

impl WatchSource for KubeWatchSource {
    fn list(&self, namespace: &str) -> BoxFuture<'_, anyhow::Result<PodListing>> {
        let pods = self.api(namespace);
        async move {
            let list = pods.list(&ListParams::default()).await?;
            Ok(PodListing::Pods(list.items.iter().map(pod_snapshot).collect()))
        }
        .boxed()
    }

    fn subscribe(
        &self,
        namespace: String,
        handler: Arc<dyn PodEventHandler>,
        stop: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        let pods = self.api(&namespace);
        watch_pods(pods, namespace, handler, stop).boxed()
    }
}

async fn watch_pods(
    api: Api<Pod>,
    namespace: String,
    handler: Arc<dyn PodEventHandler>,
    stop: CancellationToken,
) {
    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    pin_mut!(stream);

    let mut cache = PodCache::default();

    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => break,
            next = stream.next() => next,
        };

        let notifications = match next {
            Some(Ok(Event::Init)) => cache.begin_relist(),
            Some(Ok(Event::InitApply(pod))) => cache.relisted(pod_snapshot(&pod)),
            Some(Ok(Event::InitDone)) => cache.finish_relist(),
            Some(Ok(Event::Apply(pod))) => cache.applied(pod_snapshot(&pod)),
            Some(Ok(Event::Delete(pod))) => cache.deleted(pod_snapshot(&pod)),
            Some(Err(e)) => {
                // The watcher backs off and retries on its own
                tracing::warn!(namespace = %namespace, error = %e, "pod watch error");
                continue;
            }
            None => break,
        };

        for notification in notifications {
            match notification {
                Notification::Add(pod) => handler.on_add(&pod),
                Notification::Update(pod) => handler.on_update(&pod),
                Notification::Delete(pod) => handler.on_delete(&pod),
            }
        }
    }

    tracing::debug!(namespace = %namespace, "pod watch stopped");
}

#[derive(Debug, PartialEq)]
enum Notification {
    Add(PodSnapshot),
    Update(PodSnapshot),
    Delete(PodSnapshot),
}

/// Last known state of every pod in a namespace.
///
/// Turns watcher events into add/update/delete notifications: the first
/// sighting of a pod is an add, later sightings are updates, and pods missing
/// from a completed re-list are deletes.
#[derive(Default)]
struct PodCache {
    pods: HashMap<String, PodSnapshot>,
    /// Keys seen since the current re-list began
    relisting: Option<HashSet<String>>,
}

impl PodCache {
    fn key(pod: &PodSnapshot) -> String {
        pod.uid
            .clone()
            .unwrap_or_else(|| format!("{}/{}", pod.namespace, pod.name))
    }

    fn begin_relist(&mut self) -> Vec<Notification> {
        self.relisting = Some(HashSet::new());
        Vec::new()
    }

    fn relisted(&mut self, pod: PodSnapshot) -> Vec<Notification> {
        if let Some(seen) = &mut self.relisting {
            seen.insert(Self::key(&pod));
        }
        self.applied(pod)
    }

    fn finish_relist(&mut self) -> Vec<Notification> {
        let Some(seen) = self.relisting.take() else {
            return Vec::new();
        };

        let gone: Vec<String> = self
            .pods
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        gone.into_iter()
            .filter_map(|key| self.pods.remove(&key))
            .map(Notification::Delete)
            .collect()
    }

    fn applied(&mut self, pod: PodSnapshot) -> Vec<Notification> {
        let notification = if self.pods.contains_key(&Self::key(&pod)) {
            Notification::Update(pod.clone())
        } else {
            Notification::Add(pod.clone())
        };
        self.pods.insert(Self::key(&pod), pod);
        vec![notification]
    }

    fn deleted(&mut self, pod: PodSnapshot) -> Vec<Notification> {
        // Prefer the watcher's final state; it carries the latest statuses
        self.pods.remove(&Self::key(&pod));
        vec![Notification::Delete(pod)]
    }
}
