//! Record types produced by the logger and handed to sinks.

use crate::log_level::Severity;
use chrono::{DateTime, Local};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single metric observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl MetricValue {
    /// Numeric view used when forwarding to a tracker.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            MetricValue::Bool(_) | MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v:?}"),
            MetricValue::Bool(v) => write!(f, "{v}"),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! metric_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for MetricValue {
                fn from(value: $source) -> Self {
                    MetricValue::$variant(value as $target)
                }
            }
        )+
    };
}

metric_from!(Int, i64, i8, i16, i32, i64, u8, u16, u32);
metric_from!(Float, f64, f32, f64);

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => MetricValue::Int(v),
            Err(_) => MetricValue::Float(value as f64),
        }
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::from(value as u64)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// Insertion-ordered metric mapping. Writing an existing key replaces its
/// value in place, so presentation order is the order keys were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    entries: Vec<(String, MetricValue)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// The numeric subset, in order.
    pub fn numeric(&self) -> Vec<(&str, f64)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.as_str(), n)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<MetricValue>> FromIterator<(K, V)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metrics = Metrics::new();
        for (k, v) in iter {
            metrics.insert(k, v);
        }
        metrics
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Error details carried by an ERROR record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    /// Capture an error and its `source()` chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut current = err.source();
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }
        Self {
            message: err.to_string(),
            causes,
        }
    }

    /// Lines appended under a rendered record.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Error: {}", self.message)];
        lines.extend(self.causes.iter().map(|c| format!("Caused by: {c}")));
        lines
    }
}

/// Caller-supplied fields for a single log call. Unset fields are omitted from
/// every rendering.
#[derive(Debug, Clone, Default)]
pub struct LogFields {
    pub event: Option<String>,
    pub epoch: Option<u64>,
    pub step: Option<u64>,
    pub metrics: Metrics,
    pub exception: Option<ExceptionInfo>,
}

impl LogFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for fields carrying only an event message.
    pub fn event_only(event: impl Into<String>) -> Self {
        Self::new().event(event)
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn metric(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(key, value);
        self
    }

    /// Add a metric only when a value is present.
    pub fn metric_opt<V: Into<MetricValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.metric(key, v),
            None => self,
        }
    }

    pub fn exception(mut self, err: &(dyn std::error::Error + 'static)) -> Self {
        self.exception = Some(ExceptionInfo::from_error(err));
        self
    }
}

/// A finalized record, immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    #[serde(rename = "level")]
    pub severity: Severity,
    #[serde(skip)]
    pub timestamp: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

impl LogRecord {
    pub fn new(severity: Severity, logger: Option<String>, fields: LogFields) -> Self {
        Self {
            severity,
            timestamp: Local::now(),
            logger,
            event: fields.event,
            epoch: fields.epoch,
            step: fields.step,
            metrics: fields.metrics,
            exception: fields.exception,
        }
    }
}
