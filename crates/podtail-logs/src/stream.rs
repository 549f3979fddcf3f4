use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::{AsyncBufReadExt, FutureExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;

use podtail_controller::{ErrorSink, EventSink, Tailer, TailerFactory};
use podtail_types::{ContainerKey, ContainerSpec, PodSnapshot};

use crate::backoff::Backoff;
use crate::error::TailError;
use crate::parser::LogParser;

/// Builds a [`KubeTailer`] per container
pub struct KubeTailerFactory {
    client: Client,
}

impl KubeTailerFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl TailerFactory for KubeTailerFactory {
    fn create(
        &self,
        pod: &PodSnapshot,
        container: &ContainerSpec,
        since: Option<DateTime<Utc>>,
        events: EventSink,
    ) -> Arc<dyn Tailer> {
        Arc::new(KubeTailer::new(
            Api::namespaced(self.client.clone(), &pod.namespace),
            ContainerKey::new(pod, container),
            since,
            events,
        ))
    }
}

/// Follows one container's log until stopped or the log ends.
///
/// Reconnects with backoff when opening or reading the stream fails, resuming
/// after the last timestamp it delivered. Gives up once the pod is gone.
pub struct KubeTailer {
    api: Api<Pod>,
    key: ContainerKey,
    since: Option<DateTime<Utc>>,
    events: EventSink,
    cancel: CancellationToken,
}

impl KubeTailer {
    pub fn new(
        api: Api<Pod>,
        key: ContainerKey,
        since: Option<DateTime<Utc>>,
        events: EventSink,
    ) -> Self {
        Self {
            api,
            key,
            since,
            events,
            cancel: CancellationToken::new(),
        }
    }

    async fn stream(&self, on_error: ErrorSink) {
        let mut backoff = Backoff::default();
        let mut last_seen = None;

        while !self.cancel.is_cancelled() {
            match self.follow(&mut last_seen, &mut backoff).await {
                Ok(()) => {
                    tracing::debug!(key = %self.key, "log stream ended");
                    break;
                }
                Err(e) if e.is_gone() => {
                    tracing::debug!(key = %self.key, "pod is gone; not reconnecting");
                    on_error(e.into());
                    break;
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "log stream failed; backing off");
                    on_error(e.into());
                }
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Stream once. Returns `Ok` on end of stream or when stopped.
    async fn follow(
        &self,
        last_seen: &mut Option<DateTime<Utc>>,
        backoff: &mut Backoff,
    ) -> Result<(), TailError> {
        // Lines at or before this instant were delivered by an earlier stream
        let resume_after = *last_seen;

        let params = LogParams {
            follow: true,
            container: Some(self.key.container.clone()),
            since_time: resume_after.or(self.since),
            timestamps: true,
            ..Default::default()
        };

        let stream = self
            .api
            .log_stream(&self.key.pod, &params)
            .await
            .map_err(TailError::Open)?;
        backoff.reset();

        let mut lines = stream.lines();
        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                line = lines.try_next() => line.map_err(TailError::Read)?,
            };
            let Some(line) = line else {
                return Ok(());
            };

            let event = LogParser::parse(&line, &self.key);
            if let Some(ts) = event.timestamp {
                if resume_after.is_some_and(|after| ts <= after) {
                    continue;
                }
                *last_seen = Some(ts);
            }
            (self.events)(event);
        }
    }
}

impl Tailer for KubeTailer {
    fn run(&self, on_error: ErrorSink) -> BoxFuture<'_, ()> {
        self.stream(on_error).boxed()
    }

    fn stop(&self) {
        self.cancel.cancel();
    }
}
