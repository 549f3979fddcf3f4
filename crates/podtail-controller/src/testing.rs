//! In-memory collaborators for controller tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use podtail_types::{ContainerKey, ContainerSpec, LogEvent, PodSnapshot};

use crate::callbacks::Callbacks;
use crate::tailer::{ErrorSink, EventSink, Tailer, TailerFactory};
use crate::watch::{PodEventHandler, PodListing, WatchSource};

/// Poll `check` until it holds, failing the test after about a second
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

#[derive(Default)]
pub struct FakeSource {
    listings: Mutex<HashMap<String, Result<PodListing, String>>>,
    subscriptions: Mutex<HashMap<String, (Arc<dyn PodEventHandler>, CancellationToken)>>,
}

impl FakeSource {
    pub fn set_listing(&self, namespace: &str, listing: PodListing) {
        self.listings
            .lock()
            .insert(namespace.to_string(), Ok(listing));
    }

    pub fn fail_listing(&self, namespace: &str, message: &str) {
        self.listings
            .lock()
            .insert(namespace.to_string(), Err(message.to_string()));
    }

    /// Wait for the controller to subscribe to `namespace`
    pub async fn handler(&self, namespace: &str) -> Arc<dyn PodEventHandler> {
        for _ in 0..200 {
            if let Some((handler, _)) = self.subscriptions.lock().get(namespace) {
                return Arc::clone(handler);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no subscription for {}", namespace);
    }

    /// Whether the subscription for `namespace` was told to stop
    pub fn stopped(&self, namespace: &str) -> bool {
        self.subscriptions
            .lock()
            .get(namespace)
            .is_some_and(|(_, stop)| stop.is_cancelled())
    }
}

impl WatchSource for FakeSource {
    fn list(&self, namespace: &str) -> BoxFuture<'_, anyhow::Result<PodListing>> {
        let listing = self
            .listings
            .lock()
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| Ok(PodListing::Pods(Vec::new())));
        async move { listing.map_err(|message| anyhow::anyhow!(message)) }.boxed()
    }

    fn subscribe(
        &self,
        namespace: String,
        handler: Arc<dyn PodEventHandler>,
        stop: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        self.subscriptions
            .lock()
            .insert(namespace, (handler, stop.clone()));
        async move { stop.cancelled().await }.boxed()
    }
}

pub struct FakeTailer {
    key: ContainerKey,
    events: EventSink,
    failure: Option<String>,
    cancel: CancellationToken,
    stops: Arc<AtomicUsize>,
}

impl Tailer for FakeTailer {
    fn run(&self, on_error: ErrorSink) -> BoxFuture<'_, ()> {
        async move {
            (self.events)(LogEvent::new(&self.key, "hello".to_string()));
            if let Some(message) = &self.failure {
                on_error(anyhow::anyhow!(message.clone()));
            }
            self.cancel.cancelled().await;
        }
        .boxed()
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

#[derive(Default)]
pub struct FakeTailerFactory {
    created: Mutex<Vec<(ContainerKey, Option<DateTime<Utc>>)>>,
    failure: Mutex<Option<String>>,
    stops: Arc<AtomicUsize>,
}

impl FakeTailerFactory {
    /// Tailers created from now on report `message` as an error when run
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn created(&self) -> Vec<(ContainerKey, Option<DateTime<Utc>>)> {
        self.created.lock().clone()
    }

    /// Number of `stop` calls across all tailers
    pub fn stopped(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TailerFactory for FakeTailerFactory {
    fn create(
        &self,
        pod: &PodSnapshot,
        container: &ContainerSpec,
        since: Option<DateTime<Utc>>,
        events: EventSink,
    ) -> Arc<dyn Tailer> {
        let key = ContainerKey::new(pod, container);
        self.created.lock().push((key.clone(), since));
        Arc::new(FakeTailer {
            key,
            events,
            failure: self.failure.lock().clone(),
            cancel: CancellationToken::new(),
            stops: Arc::clone(&self.stops),
        })
    }
}

#[derive(Default)]
pub struct RecordingCallbacks {
    deny: AtomicBool,
    entered: Mutex<Vec<String>>,
    exited: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    events: Mutex<Vec<LogEvent>>,
    nothing_discovered: AtomicUsize,
}

impl RecordingCallbacks {
    pub fn deny_enter(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    /// `ns/pod/container`, suffixed with ` initial` for initial discovery
    pub fn entered(&self) -> Vec<String> {
        self.entered.lock().clone()
    }

    pub fn exited(&self) -> Vec<String> {
        self.exited.lock().clone()
    }

    /// `ns/pod/container: message`
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    pub fn nothing_discovered(&self) -> usize {
        self.nothing_discovered.load(Ordering::SeqCst)
    }
}

impl Callbacks for RecordingCallbacks {
    fn on_event(&self, event: LogEvent) {
        self.events.lock().push(event);
    }

    fn on_enter(&self, pod: &PodSnapshot, container: &ContainerSpec, initial: bool) -> bool {
        let key = ContainerKey::new(pod, container);
        let entry = if initial {
            format!("{} initial", key)
        } else {
            key.to_string()
        };
        self.entered.lock().push(entry);
        !self.deny.load(Ordering::SeqCst)
    }

    fn on_exit(&self, pod: &PodSnapshot, container: &ContainerSpec) {
        self.exited
            .lock()
            .push(ContainerKey::new(pod, container).to_string());
    }

    fn on_error(&self, pod: &PodSnapshot, container: &ContainerSpec, error: &anyhow::Error) {
        self.errors
            .lock()
            .push(format!("{}: {}", ContainerKey::new(pod, container), error));
    }

    fn on_nothing_discovered(&self) {
        self.nothing_discovered.fetch_add(1, Ordering::SeqCst);
    }
}
