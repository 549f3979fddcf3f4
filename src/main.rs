mod config;
mod output;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use podtail_controller::{Cancelled, Controller};
use podtail_k8s::{KubeClient, KubeWatchSource};
use podtail_logs::KubeTailerFactory;

use crate::config::{Config, FileConfig};
use crate::output::{ConsolePrinter, OutputMode};

/// Podtail - Follow the logs of every matching container in a Kubernetes cluster
#[derive(Parser, Debug)]
#[command(name = "podtail")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Kubernetes context name (defaults to the current context)
    #[arg(long)]
    context: Option<String>,

    /// Namespace to watch (repeatable; defaults to the context's namespace)
    #[arg(short = 'n', long = "namespace", value_name = "NAMESPACE")]
    namespaces: Vec<String>,

    /// Watch every namespace
    #[arg(short = 'A', long)]
    all_namespaces: bool,

    /// Include pods whose name matches this regex (repeatable)
    #[arg(long = "pod", value_name = "REGEX")]
    pods: Vec<String>,

    /// Include pods carrying this label (repeatable)
    #[arg(long = "label", value_name = "KEY=VALUE")]
    labels: Vec<String>,

    /// Include containers whose name matches this regex (repeatable)
    #[arg(long = "container-match", value_name = "REGEX")]
    container_matches: Vec<String>,

    /// Exclude pods whose name matches this regex (repeatable)
    #[arg(long = "ignore-pod", value_name = "REGEX")]
    ignore_pods: Vec<String>,

    /// Exclude pods carrying this label (repeatable)
    #[arg(long = "ignore-label", value_name = "KEY=VALUE")]
    ignore_labels: Vec<String>,

    /// Exclude containers whose name matches this regex (repeatable)
    #[arg(long = "ignore-container", value_name = "REGEX")]
    ignore_containers: Vec<String>,

    /// Exclude every pod in this namespace (repeatable)
    #[arg(long = "ignore-namespace", value_name = "NAMESPACE")]
    ignore_namespaces: Vec<String>,

    /// Only tail containers with exactly this name
    #[arg(short = 'c', long)]
    container: Option<String>,

    /// Replay logs since a duration ago (30s, 5m, 2h, 1d) or an RFC3339 time
    #[arg(long, value_name = "SINCE")]
    since: Option<String>,

    /// Replay each container's log from the beginning
    #[arg(long)]
    since_start: bool,

    /// Maximum number of containers tailed at once
    #[arg(long, value_name = "N")]
    max_streams: Option<usize>,

    /// Output format
    #[arg(short = 'o', long, value_enum)]
    output: Option<OutputMode>,

    /// TOML file with default settings
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args) -> Result<()> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = Config::resolve(&args, file, Utc::now())?;

    let kube_client = KubeClient::new()?;
    let context = config.context.as_deref();
    let client = kube_client.client(context).await?;
    let namespaces = config
        .namespaces
        .resolve(kube_client.context_namespace(context));

    tracing::info!(
        context = context.or(kube_client.current_context()).unwrap_or("<default>"),
        namespaces = ?namespaces,
        "starting"
    );

    let controller = Controller::new(
        config.controller_options(namespaces),
        Arc::new(KubeWatchSource::new(client.clone())),
        Arc::new(KubeTailerFactory::new(client)),
        Arc::new(ConsolePrinter::new(config.output, config.max_streams)),
    );

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(shutdown::cancel_on_signal(cancel.clone()));

    let result = controller.run(cancel).await;
    signals.abort();

    controller.stop_all().await;

    match result {
        Err(e) if e.is::<Cancelled>() => {
            tracing::debug!("shut down");
            Ok(())
        }
        other => other,
    }
}
