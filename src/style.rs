//! Terminal styles for rendered records.
//!
//! Styles are declared in configuration as `{ color, weight }` pairs and
//! validated once when a logger is built; rendering never fails on a style.

use crate::errors::{StepLogError, StepLogResult};
use crate::log_level::Severity;
use colored::{Color, ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weight {
    #[default]
    Normal,
    Bright,
    Dim,
}

/// Declarative style as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub weight: Weight,
}

impl StyleSpec {
    pub fn new(color: &str, weight: Weight) -> Self {
        Self {
            color: Some(color.to_string()),
            weight,
        }
    }

    pub fn plain() -> Self {
        Self {
            color: None,
            weight: Weight::Normal,
        }
    }

    /// Validate the color name and produce a ready-to-apply style.
    pub fn resolve(&self, field: &str) -> StepLogResult<Style> {
        let color = match &self.color {
            Some(name) => Some(Color::from_str(name).map_err(|_| {
                StepLogError::invalid_style(field, format!("unknown color '{name}'"))
            })?),
            None => None,
        };
        Ok(Style {
            color,
            weight: self.weight,
        })
    }
}

/// Default style table keyed by severity name.
pub fn default_level_styles() -> BTreeMap<String, StyleSpec> {
    Severity::ALL
        .iter()
        .map(|severity| {
            let spec = match severity {
                Severity::Debug => StyleSpec::new("green", Weight::Normal),
                Severity::Train => StyleSpec::new("green", Weight::Bright),
                Severity::Info => StyleSpec::new("cyan", Weight::Normal),
                Severity::Test => StyleSpec::new("cyan", Weight::Bright),
                Severity::Warn => StyleSpec::new("yellow", Weight::Normal),
                Severity::Error => StyleSpec::new("red", Weight::Normal),
            };
            (severity.name().to_string(), spec)
        })
        .collect()
}

/// A validated style.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Style {
    color: Option<Color>,
    weight: Weight,
}

impl Style {
    pub fn paint(&self, text: &str) -> ColoredString {
        let painted = match self.color {
            Some(color) => text.color(color),
            None => text.normal(),
        };
        match self.weight {
            Weight::Normal => painted,
            Weight::Bright => painted.bold(),
            Weight::Dim => painted.dimmed(),
        }
    }
}

/// Per-field styles used by the terminal renderer.
#[derive(Debug, Clone)]
pub struct StyleTable {
    pub logger: Style,
    pub timestamp: Style,
    pub epoch: Style,
    pub step: Style,
    pub event: Style,
    pub metric: Style,
    levels: BTreeMap<Severity, Style>,
}

impl StyleTable {
    pub fn level(&self, severity: Severity) -> Style {
        self.levels.get(&severity).copied().unwrap_or_default()
    }

    pub fn from_specs(
        fields: FieldStyles<'_>,
        level_styles: &BTreeMap<String, StyleSpec>,
    ) -> StepLogResult<Self> {
        let mut levels = BTreeMap::new();
        for (name, spec) in level_styles {
            let severity: Severity = name.parse()?;
            levels.insert(severity, spec.resolve(&format!("level_styles.{name}"))?);
        }

        Ok(Self {
            logger: fields.logger.resolve("loggername_style")?,
            timestamp: fields.timestamp.resolve("timestamp_style")?,
            epoch: fields.epoch.resolve("epoch_style")?,
            step: fields.step.resolve("step_style")?,
            event: fields.event.resolve("event_style")?,
            metric: fields.metric.resolve("metric_style")?,
            levels,
        })
    }
}

/// Borrowed field style specs, grouped to keep `from_specs` readable.
pub struct FieldStyles<'a> {
    pub logger: &'a StyleSpec,
    pub timestamp: &'a StyleSpec,
    pub epoch: &'a StyleSpec,
    pub step: &'a StyleSpec,
    pub event: &'a StyleSpec,
    pub metric: &'a StyleSpec,
}
