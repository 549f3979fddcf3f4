//! Console sink for tailed log lines

use std::collections::HashSet;
use std::io::Write;

use clap::ValueEnum;
use parking_lot::Mutex;
use serde::Deserialize;

use podtail_controller::{Callbacks, ContainerKey, ContainerSpec, LogEvent, PodSnapshot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// `namespace/pod[container]: message`
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// Prints every log line to stdout and reports session changes on stderr.
///
/// With a stream limit, sessions past the limit are vetoed until another one exits.
pub struct ConsolePrinter {
    mode: OutputMode,
    max_streams: Option<usize>,
    active: Mutex<HashSet<ContainerKey>>,
}

impl ConsolePrinter {
    pub fn new(mode: OutputMode, max_streams: Option<usize>) -> Self {
        Self {
            mode,
            max_streams,
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn format(&self, event: &LogEvent) -> String {
        match self.mode {
            OutputMode::Human => {
                let mut line = format!("{}/{}[{}]: ", event.namespace, event.pod, event.container);
                if let Some(ts) = event.timestamp {
                    line.push_str(&ts.format("%Y-%m-%dT%H:%M:%S%.3fZ ").to_string());
                }
                line.push_str(&event.message);
                line
            }
            OutputMode::Json => serde_json::to_string(event).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to encode log event");
                event.message.clone()
            }),
        }
    }

    fn admit(&self, key: ContainerKey) -> bool {
        let mut active = self.active.lock();
        if let Some(max) = self.max_streams {
            if active.len() >= max && !active.contains(&key) {
                return false;
            }
        }
        active.insert(key);
        true
    }
}

impl Callbacks for ConsolePrinter {
    fn on_event(&self, event: LogEvent) {
        let line = self.format(&event);
        let mut stdout = std::io::stdout().lock();
        // A closed stdout (e.g. piped into `head`) is not worth reporting per line
        let _ = writeln!(stdout, "{}", line);
    }

    fn on_enter(&self, pod: &PodSnapshot, container: &ContainerSpec, initial: bool) -> bool {
        let key = ContainerKey::new(pod, container);
        if !self.admit(key.clone()) {
            tracing::warn!(key = %key, "stream limit reached; not tailing");
            return false;
        }
        if initial {
            tracing::debug!(key = %key, "tailing");
        } else {
            eprintln!("+ {}", key);
        }
        true
    }

    fn on_exit(&self, pod: &PodSnapshot, container: &ContainerSpec) {
        let key = ContainerKey::new(pod, container);
        self.active.lock().remove(&key);
        eprintln!("- {}", key);
    }

    fn on_error(&self, pod: &PodSnapshot, container: &ContainerSpec, error: &anyhow::Error) {
        tracing::warn!(key = %ContainerKey::new(pod, container), error = %format!("{:#}", error), "log stream error");
    }

    fn on_nothing_discovered(&self) {
        tracing::warn!("no matching containers found; waiting for new pods");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use tokio_util::sync::CancellationToken;

    use podtail_controller::{
        Controller, ControllerOptions, ErrorSink, EventSink, PodEventHandler, PodListing, Tailer,
        TailerFactory, WatchSource,
    };
    use podtail_types::{ContainerStatusInfo, LogLevel, PodPhase};

    fn event() -> LogEvent {
        let key = ContainerKey {
            namespace: "ns1".to_string(),
            pod: "p1".to_string(),
            container: "c1".to_string(),
        };
        LogEvent::new(&key, "hello".to_string())
    }

    #[test]
    fn test_human_format() {
        let printer = ConsolePrinter::new(OutputMode::Human, None);
        assert_eq!(printer.format(&event()), "ns1/p1[c1]: hello");

        let mut stamped = event();
        stamped.timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
        assert_eq!(
            printer.format(&stamped),
            "ns1/p1[c1]: 2024-01-15T10:30:00.000Z hello"
        );
    }

    #[test]
    fn test_json_format() {
        let printer = ConsolePrinter::new(OutputMode::Json, None);
        let mut event = event();
        event.level = LogLevel::Error;
        let value: serde_json::Value = serde_json::from_str(&printer.format(&event)).unwrap();
        assert_eq!(value["namespace"], "ns1");
        assert_eq!(value["container"], "c1");
        assert_eq!(value["level"], "error");
        assert_eq!(value["message"], "hello");
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn test_stream_limit_vetoes_until_exit() {
        let printer = ConsolePrinter::new(OutputMode::Human, Some(1));
        let pod = PodSnapshot::new("p1", "ns1");
        let a = ContainerSpec::new("a");
        let b = ContainerSpec::new("b");

        assert!(printer.on_enter(&pod, &a, true));
        assert!(!printer.on_enter(&pod, &b, false));

        printer.on_exit(&pod, &a);
        assert!(printer.on_enter(&pod, &b, false));
    }

    struct IdleTailer(CancellationToken);

    impl Tailer for IdleTailer {
        fn run(&self, _on_error: ErrorSink) -> BoxFuture<'_, ()> {
            self.0.cancelled().boxed()
        }

        fn stop(&self) {
            self.0.cancel();
        }
    }

    struct IdleTailers;

    impl TailerFactory for IdleTailers {
        fn create(
            &self,
            _pod: &PodSnapshot,
            _container: &ContainerSpec,
            _since: Option<DateTime<Utc>>,
            _events: EventSink,
        ) -> Arc<dyn Tailer> {
            Arc::new(IdleTailer(CancellationToken::new()))
        }
    }

    /// Empty listing, then: `stuck` added, updated and deleted while waiting,
    /// then `ready` added
    struct ScriptedSource {
        stuck: PodSnapshot,
        ready: PodSnapshot,
    }

    impl WatchSource for ScriptedSource {
        fn list(&self, _namespace: &str) -> BoxFuture<'_, anyhow::Result<PodListing>> {
            async { Ok(PodListing::Pods(Vec::new())) }.boxed()
        }

        fn subscribe(
            &self,
            _namespace: String,
            handler: Arc<dyn PodEventHandler>,
            stop: CancellationToken,
        ) -> BoxFuture<'static, ()> {
            let (stuck, ready) = (self.stuck.clone(), self.ready.clone());
            async move {
                handler.on_add(&stuck);
                handler.on_update(&stuck);
                handler.on_delete(&stuck);
                handler.on_add(&ready);
                stop.cancelled().await;
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_container_that_never_ran_does_not_hold_a_slot() {
        let mut stuck = PodSnapshot::new("stuck", "ns1");
        stuck.phase = PodPhase::Pending;
        stuck.containers.push(ContainerSpec::new("a"));
        stuck.container_statuses.push(ContainerStatusInfo::waiting("a"));

        let mut ready = PodSnapshot::new("ready", "ns1");
        ready.phase = PodPhase::Running;
        ready.containers.push(ContainerSpec::new("b"));
        ready
            .container_statuses
            .push(ContainerStatusInfo::running("b", Utc::now()));

        let controller = Controller::new(
            ControllerOptions::new(vec!["ns1".to_string()]),
            Arc::new(ScriptedSource { stuck, ready }),
            Arc::new(IdleTailers),
            Arc::new(ConsolePrinter::new(OutputMode::Human, Some(1))),
        );
        let cancel = CancellationToken::new();
        let run = tokio::spawn({
            let controller = controller.clone();
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });

        let mut sessions = Vec::new();
        for _ in 0..200 {
            sessions = controller.active_sessions();
            if !sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            sessions,
            vec![ContainerKey {
                namespace: "ns1".to_string(),
                pod: "ready".to_string(),
                container: "b".to_string(),
            }]
        );

        cancel.cancel();
        assert!(run.await.unwrap().is_err());
        controller.stop_all().await;
        assert!(controller.active_sessions().is_empty());
    }

    #[test]
    fn test_no_limit_admits_everything() {
        let printer = ConsolePrinter::new(OutputMode::Human, None);
        let pod = PodSnapshot::new("p1", "ns1");
        for name in ["a", "b", "c"] {
            assert!(printer.on_enter(&pod, &ContainerSpec::new(name), true));
        }
    }
}
