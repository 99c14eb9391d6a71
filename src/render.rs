//! Record rendering for each sink flavor.
//!
//! All flavors share one column layout:
//! `logger timestamp [LEVEL] E0001 S0002 event key=value ...`
//! Absent fields are skipped entirely, and metrics keep insertion order.

use crate::errors::{StepLogError, StepLogResult};
use crate::log_level::Severity;
use crate::log_record::LogRecord;
use crate::style::StyleTable;
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Write;

/// Named timestamp layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    Detailed,
    Normal,
    Short,
    Man,
}

impl TimestampFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            TimestampFormat::Detailed => "%w %m-%d-%Y %H:%M:%S%.6f%:z",
            TimestampFormat::Normal => "%m-%d-%Y %H:%M:%S",
            TimestampFormat::Short => "%m-%d@%H:%M",
            TimestampFormat::Man => "%c",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "detailed" => Some(TimestampFormat::Detailed),
            "normal" => Some(TimestampFormat::Normal),
            "short" => Some(TimestampFormat::Short),
            "man" => Some(TimestampFormat::Man),
            _ => None,
        }
    }

    /// Resolve a configured value: either a preset name or a chrono strftime
    /// pattern. Patterns chrono cannot parse are rejected here so rendering
    /// never fails later.
    pub fn resolve(value: &str) -> StepLogResult<String> {
        if let Some(preset) = Self::from_name(value) {
            return Ok(preset.pattern().to_string());
        }
        if StrftimeItems::new(value).any(|item| matches!(item, Item::Error)) {
            return Err(StepLogError::config(format!(
                "invalid timestamp format '{value}'"
            )));
        }
        Ok(value.to_string())
    }
}

/// Rendering parameters shared by every sink of one logger.
#[derive(Debug, Clone)]
pub struct RecordRenderer {
    timestamp_pattern: String,
    timestamp_utc: bool,
    epoch_width: usize,
    step_width: usize,
    level_width: usize,
    styles: StyleTable,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    record: &'a LogRecord,
}

impl RecordRenderer {
    pub fn new(
        timestamp_format: &str,
        timestamp_utc: bool,
        epoch_width: usize,
        step_width: usize,
        styles: StyleTable,
    ) -> StepLogResult<Self> {
        Ok(Self {
            timestamp_pattern: TimestampFormat::resolve(timestamp_format)?,
            timestamp_utc,
            epoch_width,
            step_width,
            level_width: Severity::max_name_len(),
            styles,
        })
    }

    pub fn timestamp(&self, record: &LogRecord) -> String {
        let mut out = String::new();
        let written = if self.timestamp_utc {
            write!(out, "{}", record.timestamp.with_timezone(&Utc).format(&self.timestamp_pattern))
        } else {
            write!(out, "{}", record.timestamp.format(&self.timestamp_pattern))
        };
        if written.is_err() {
            out.clear();
        }
        out
    }

    fn epoch_text(&self, epoch: u64) -> String {
        format!("E{:0width$}", epoch, width = self.epoch_width)
    }

    fn step_text(&self, step: u64) -> String {
        format!("S{:0width$}", step, width = self.step_width)
    }

    fn level_text(&self, severity: Severity) -> String {
        format!("{:<width$}", severity.name(), width = self.level_width)
    }

    /// Colored single line for the terminal, with any exception lines below.
    pub fn render_terminal(&self, record: &LogRecord) -> String {
        let styles = &self.styles;
        let mut columns: Vec<String> = Vec::new();

        if let Some(logger) = &record.logger {
            columns.push(styles.logger.paint(logger).to_string());
        }
        columns.push(styles.timestamp.paint(&self.timestamp(record)).to_string());
        columns.push(format!(
            "[{}]",
            styles.level(record.severity).paint(&self.level_text(record.severity))
        ));
        if let Some(epoch) = record.epoch {
            columns.push(styles.epoch.paint(&self.epoch_text(epoch)).to_string());
        }
        if let Some(step) = record.step {
            columns.push(styles.step.paint(&self.step_text(step)).to_string());
        }
        if let Some(event) = &record.event {
            columns.push(styles.event.paint(event).to_string());
        }
        for (key, value) in record.metrics.iter() {
            columns.push(format!(
                "{}={}",
                styles.metric.paint(key),
                styles.metric.paint(&value.to_string())
            ));
        }

        self.with_exception(columns.join(" "), record)
    }

    /// Plain line for the durable human-readable transcript.
    pub fn render_man(&self, record: &LogRecord) -> String {
        let mut columns: Vec<String> = Vec::new();

        if let Some(logger) = &record.logger {
            columns.push(logger.clone());
        }
        columns.push(self.timestamp(record));
        columns.push(format!("[{}]", self.level_text(record.severity)));
        if let Some(epoch) = record.epoch {
            columns.push(self.epoch_text(epoch));
        }
        if let Some(step) = record.step {
            columns.push(self.step_text(step));
        }
        if let Some(event) = &record.event {
            columns.push(event.clone());
        }
        for (key, value) in record.metrics.iter() {
            columns.push(format!("{key}={value}"));
        }

        self.with_exception(columns.join(" "), record)
    }

    /// One JSON object, without a trailing newline.
    pub fn render_json(&self, record: &LogRecord) -> StepLogResult<String> {
        let line = JsonLine {
            timestamp: self.timestamp(record),
            record,
        };
        serde_json::to_string(&line)
            .map_err(|e| StepLogError::serialization("rendering json record", e))
    }

    fn with_exception(&self, line: String, record: &LogRecord) -> String {
        match &record.exception {
            Some(info) => {
                let mut lines = vec![line];
                lines.extend(info.render_lines());
                lines.join("\n")
            }
            None => line,
        }
    }
}
