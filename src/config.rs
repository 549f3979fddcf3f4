//! Runtime configuration: CLI arguments merged over an optional TOML file

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use podtail_controller::{ControllerOptions, PatternMatcher, ReplayFrom};

use crate::Args;
use crate::output::OutputMode;

/// Settings read from `--config`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub context: Option<String>,
    pub namespaces: Vec<String>,
    pub all_namespaces: bool,
    pub pods: Vec<String>,
    pub labels: Vec<String>,
    pub container_matches: Vec<String>,
    pub ignore_pods: Vec<String>,
    pub ignore_labels: Vec<String>,
    pub ignore_containers: Vec<String>,
    pub ignore_namespaces: Vec<String>,
    pub container: Option<String>,
    pub since: Option<String>,
    pub since_start: bool,
    pub max_streams: Option<usize>,
    pub output: Option<OutputMode>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Which namespaces to watch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamespaceSelection {
    /// The kubeconfig context's namespace, else `default`
    Context,
    Named(Vec<String>),
    All,
}

impl NamespaceSelection {
    /// Namespace names for the controller; the empty name means all namespaces
    pub fn resolve(&self, context_namespace: Option<String>) -> Vec<String> {
        match self {
            Self::Context => vec![context_namespace.unwrap_or_else(|| "default".to_string())],
            Self::Named(names) => names.clone(),
            Self::All => vec![String::new()],
        }
    }
}

/// Fully resolved configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub context: Option<String>,
    pub namespaces: NamespaceSelection,
    /// `None` includes every pod
    pub inclusion: Option<PatternMatcher>,
    pub exclusion: PatternMatcher,
    pub container: Option<String>,
    pub replay: ReplayFrom,
    pub max_streams: Option<usize>,
    pub output: OutputMode,
}

impl Config {
    /// Merge CLI arguments over file settings. Lists are concatenated, scalars
    /// from the command line win.
    pub fn resolve(args: &Args, file: FileConfig, now: DateTime<Utc>) -> Result<Self> {
        let all_namespaces = args.all_namespaces || file.all_namespaces;
        let names = concat(&file.namespaces, &args.namespaces);
        let namespaces = match (all_namespaces, names.is_empty()) {
            (true, false) => anyhow::bail!("--namespace cannot be combined with --all-namespaces"),
            (true, true) => NamespaceSelection::All,
            (false, true) => NamespaceSelection::Context,
            (false, false) => NamespaceSelection::Named(names),
        };

        let pods = concat(&file.pods, &args.pods);
        let labels = concat(&file.labels, &args.labels);
        let containers = concat(&file.container_matches, &args.container_matches);
        let inclusion = build_matcher(&pods, &labels, &containers)?;

        let mut exclusion = build_matcher(
            &concat(&file.ignore_pods, &args.ignore_pods),
            &concat(&file.ignore_labels, &args.ignore_labels),
            &concat(&file.ignore_containers, &args.ignore_containers),
        )?;
        for namespace in concat(&file.ignore_namespaces, &args.ignore_namespaces) {
            exclusion = exclusion.with_namespace(namespace);
        }

        let since_start = args.since_start || file.since_start;
        let since = args.since.clone().or(file.since);
        let replay = match (since_start, since) {
            (true, Some(_)) => anyhow::bail!("--since cannot be combined with --since-start"),
            (true, None) => ReplayFrom::Start,
            (false, Some(since)) => ReplayFrom::At(parse_since(&since, now)?),
            (false, None) => ReplayFrom::Now,
        };

        Ok(Self {
            context: args.context.clone().or(file.context),
            namespaces,
            inclusion: (!inclusion.is_empty()).then_some(inclusion),
            exclusion,
            container: args.container.clone().or(file.container),
            replay,
            max_streams: args.max_streams.or(file.max_streams),
            output: args.output.or(file.output).unwrap_or_default(),
        })
    }

    pub fn controller_options(&self, namespaces: Vec<String>) -> ControllerOptions {
        let mut options = ControllerOptions::new(namespaces)
            .with_exclusion(self.exclusion.clone())
            .with_replay(self.replay);
        if let Some(inclusion) = &self.inclusion {
            options = options.with_inclusion(inclusion.clone());
        }
        if let Some(container) = &self.container {
            options = options.with_container_name(container.clone());
        }
        options
    }
}

fn concat(file: &[String], cli: &[String]) -> Vec<String> {
    file.iter().chain(cli.iter()).cloned().collect()
}

fn build_matcher(pods: &[String], labels: &[String], containers: &[String]) -> Result<PatternMatcher> {
    let mut matcher = PatternMatcher::new();
    for pattern in pods {
        matcher = matcher
            .with_pod(pattern)
            .with_context(|| format!("Invalid pod pattern '{}'", pattern))?;
    }
    for pattern in containers {
        matcher = matcher
            .with_container(pattern)
            .with_context(|| format!("Invalid container pattern '{}'", pattern))?;
    }
    for label in labels {
        let Some((key, value)) = label.split_once('=') else {
            anyhow::bail!("Invalid label '{}', expected key=value", label);
        };
        matcher = matcher.with_label(key.trim(), value.trim());
    }
    Ok(matcher)
}

/// Parse `--since`: an RFC3339 instant, or a duration like `30s`, `5m`, `2h`, `1d`
pub fn parse_since(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let value = value.trim();
    let split = value.len().saturating_sub(1);
    let (amount, unit) = (value.get(..split).unwrap_or_default(), value.get(split..).unwrap_or_default());
    let amount: i64 = amount
        .parse()
        .with_context(|| format!("Invalid --since value '{}'", value))?;

    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    }
    .with_context(|| format!("Invalid --since value '{}'", value))?;

    Ok(now - duration)
}
