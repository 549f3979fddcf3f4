use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use podtail_types::{ContainerKey, LogEvent, LogLevel};

/// Fields structured loggers commonly put the level in
const LEVEL_FIELDS: [&str; 5] = ["level", "lvl", "severity", "log.level", "loglevel"];

/// Turns kubelet log lines into events
pub struct LogParser;

impl LogParser {
    /// Parse a raw line read with `timestamps=true` from the given container
    pub fn parse(raw: &str, key: &ContainerKey) -> LogEvent {
        let (timestamp, content) = split_timestamp(raw);

        let mut event = LogEvent::new(key, content.to_string());
        event.timestamp = timestamp;
        event.level = json_level(content).unwrap_or_else(|| text_level(content));
        event
    }
}

/// The kubelet prefixes each line with an RFC3339 instant and one space
fn split_timestamp(raw: &str) -> (Option<DateTime<Utc>>, &str) {
    let (head, rest) = raw.split_once(' ').unwrap_or((raw, ""));
    match DateTime::parse_from_rfc3339(head) {
        Ok(ts) => (Some(ts.with_timezone(&Utc)), rest),
        Err(_) => (None, raw),
    }
}

/// Level of a JSON object line, `None` if the line is not one
fn json_level(content: &str) -> Option<LogLevel> {
    let content = content.trim();
    if !content.starts_with('{') {
        return None;
    }
    let fields: Map<String, Value> = serde_json::from_str(content).ok()?;

    let level = match LEVEL_FIELDS.iter().find_map(|name| fields.get(*name)) {
        Some(Value::String(s)) => LogLevel::from_str(s),
        // pino/bunyan style: 10 trace .. 60 fatal
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0..=10) => LogLevel::Trace,
            Some(11..=20) => LogLevel::Debug,
            Some(21..=30) => LogLevel::Info,
            Some(31..=40) => LogLevel::Warn,
            Some(41..=50) => LogLevel::Error,
            Some(_) => LogLevel::Fatal,
            None => LogLevel::Unknown,
        },
        _ => LogLevel::Unknown,
    };
    Some(level)
}

/// Level named by the first word of a plain-text line, e.g. `[WARN] ...` or `error: ...`
fn text_level(content: &str) -> LogLevel {
    content
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|word| !word.is_empty())
        .map_or(LogLevel::Unknown, LogLevel::from_str)
}
