use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use podtail_types::{ContainerKey, ContainerSpec, PodSnapshot};

use crate::callbacks::Callbacks;
use crate::error::Cancelled;
use crate::options::ControllerOptions;
use crate::policy::should_include_container;
use crate::registry::{Session, SessionRegistry};
use crate::tailer::{ErrorSink, EventSink, TailerFactory};
use crate::timestamp::resolve_start_timestamp;
use crate::watch::{PodEventHandler, WatchSource};

/// Keeps exactly one tailer running per matching container
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

struct Inner {
    options: ControllerOptions,
    source: Arc<dyn WatchSource>,
    tailers: Arc<dyn TailerFactory>,
    callbacks: Arc<dyn Callbacks>,
    registry: SessionRegistry,
}

impl Controller {
    pub fn new(
        options: ControllerOptions,
        source: Arc<dyn WatchSource>,
        tailers: Arc<dyn TailerFactory>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                source,
                tailers,
                callbacks,
                registry: SessionRegistry::new(),
            }),
        }
    }

    /// List and start watching every configured namespace, then wait for
    /// `cancel`.
    ///
    /// Fails if any initial listing fails. Otherwise returns an error wrapping
    /// [`Cancelled`] once `cancel` fires. Sessions that are still running at
    /// that point are left alone; see [`Controller::stop_all`].
    ///
    /// # Panics
    ///
    /// If the watch source returns a listing of an unrecognized shape.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let stop = CancellationToken::new();
        let _stop_watches = stop.clone().drop_guard();

        let handler: Arc<dyn PodEventHandler> = self.inner.clone();
        let mut discovered_any = false;

        for namespace in &self.inner.options.namespaces {
            let listing = self
                .inner
                .source
                .list(namespace)
                .await
                .with_context(|| format!("listing pods in {:?}", namespace))?;

            let pods = match listing.into_pods() {
                Ok(pods) => pods,
                Err(kind) => panic!("unexpected return type {} when listing pods", kind),
            };
            tracing::debug!(namespace = %namespace, pods = pods.len(), "listed pods");

            for pod in &pods {
                if self.inner.on_initial_add(pod) {
                    discovered_any = true;
                }
            }

            tokio::spawn(self.inner.source.subscribe(
                namespace.clone(),
                Arc::clone(&handler),
                stop.clone(),
            ));
        }

        if !discovered_any {
            self.inner.callbacks.on_nothing_discovered();
        }

        cancel.cancelled().await;
        Err(Cancelled.into())
    }

    /// Keys of all sessions currently registered, sorted
    pub fn active_sessions(&self) -> Vec<ContainerKey> {
        self.inner.registry.keys()
    }

    /// Stop every session, report each through `on_exit`, and wait for their
    /// tasks to finish.
    pub async fn stop_all(&self) {
        let tasks: Vec<_> = {
            let mut sessions = self.inner.registry.lock();
            sessions
                .drain()
                .map(|(key, session)| {
                    session.tailer.stop();
                    self.inner.callbacks.on_exit(&session.pod, &session.container);
                    tracing::info!(key = %key, "stopped tailing");
                    session.task
                })
                .collect()
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "tailer task failed");
            }
        }
    }
}

impl Inner {
    /// Returns whether any container of the pod passed the inclusion policy
    fn on_initial_add(&self, pod: &PodSnapshot) -> bool {
        let mut added = false;
        for container in pod.init_containers.iter().chain(pod.containers.iter()) {
            if should_include_container(&self.options, pod, container) {
                self.add_container(pod, container, true);
                added = true;
            }
        }
        added
    }

    fn add_container(&self, pod: &PodSnapshot, container: &ContainerSpec, initial: bool) {
        let mut sessions = self.registry.lock();

        let key = ContainerKey::new(pod, container);
        if sessions.contains_key(&key) {
            return;
        }

        // An accepted `on_enter` is always followed by a registered session
        let Some(since) = resolve_start_timestamp(self.options.replay, pod, container, initial)
        else {
            tracing::debug!(key = %key, "no running status yet, not tailing");
            return;
        };

        if !self.callbacks.on_enter(pod, container, initial) {
            tracing::debug!(key = %key, "session vetoed");
            return;
        }

        let pod = pod.clone();
        let container = container.clone();

        let events: EventSink = {
            let callbacks = Arc::clone(&self.callbacks);
            Arc::new(move |event| callbacks.on_event(event))
        };
        let tailer = self.tailers.create(&pod, &container, since, events);

        let task = {
            let tailer = Arc::clone(&tailer);
            let callbacks = Arc::clone(&self.callbacks);
            let (pod, container) = (pod.clone(), container.clone());
            tokio::spawn(async move {
                let on_error: ErrorSink =
                    Box::new(move |err| callbacks.on_error(&pod, &container, &err));
                tailer.run(on_error).await;
            })
        };

        tracing::info!(key = %key, initial, since = ?since, "started tailing");
        sessions.insert(
            key,
            Session {
                tailer,
                task,
                pod,
                container,
            },
        );
    }

    fn delete_container(&self, pod: &PodSnapshot, container: &ContainerSpec) {
        let mut sessions = self.registry.lock();

        let key = ContainerKey::new(pod, container);
        if let Some(session) = sessions.remove(&key) {
            session.tailer.stop();
            self.callbacks.on_exit(pod, container);
            tracing::info!(key = %key, "stopped tailing");
        }
    }
}

impl PodEventHandler for Inner {
    fn on_add(&self, pod: &PodSnapshot) {
        for container in pod.init_containers.iter().chain(pod.containers.iter()) {
            if should_include_container(&self.options, pod, container) {
                self.add_container(pod, container, false);
            }
        }
    }

    // Statuses are matched against regular containers only, unlike on_add
    fn on_update(&self, pod: &PodSnapshot) {
        for status in pod.all_statuses() {
            let Some(container) = pod.container(&status.name) else {
                continue;
            };

            if should_include_container(&self.options, pod, container) {
                self.add_container(pod, container, false);
            } else {
                self.delete_container(pod, container);
            }
        }
    }

    fn on_delete(&self, pod: &PodSnapshot) {
        for container in &pod.containers {
            self.delete_container(pod, container);
        }
    }
}
