// log_level.rs
// Purpose: Ordered severities and the periodic elevation rule applied to step records

use crate::errors::{StepLogError, StepLogResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity classifies a record. The order is fixed: it drives both threshold
/// filtering and elevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Debug,
    Train,
    Info,
    Test,
    Warn,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Debug,
        Severity::Train,
        Severity::Info,
        Severity::Test,
        Severity::Warn,
        Severity::Error,
    ];

    /// Upper-case name used as the style-table key and the rendered tag.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Train => "TRAIN",
            Severity::Info => "INFO",
            Severity::Test => "TEST",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Numeric level, compatible with the conventional 10/20/30/40 scale.
    pub fn value(&self) -> u8 {
        match self {
            Severity::Debug => 10,
            Severity::Train => 15,
            Severity::Info => 20,
            Severity::Test => 25,
            Severity::Warn => 30,
            Severity::Error => 40,
        }
    }

    /// Width of the longest severity name, used to align the severity column.
    pub fn max_name_len() -> usize {
        Self::ALL.iter().map(|s| s.name().len()).max().unwrap_or(0)
    }
}

impl FromStr for Severity {
    type Err = StepLogError;

    fn from_str(input: &str) -> Result<Severity, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "train" => Ok(Severity::Train),
            "info" => Ok(Severity::Info),
            "test" => Ok(Severity::Test),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(StepLogError::unknown_severity(input)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = StepLogError;

    fn try_from(value: String) -> Result<Self, StepLogError> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.name().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A level as supplied by a caller: either already typed or a name that still
/// has to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelArg {
    Severity(Severity),
    Name(String),
}

impl LevelArg {
    pub fn to_severity(&self) -> StepLogResult<Severity> {
        match self {
            LevelArg::Severity(severity) => Ok(*severity),
            LevelArg::Name(name) => name.parse(),
        }
    }
}

impl Default for LevelArg {
    fn default() -> Self {
        LevelArg::Severity(Severity::Train)
    }
}

impl From<Severity> for LevelArg {
    fn from(severity: Severity) -> Self {
        LevelArg::Severity(severity)
    }
}

impl From<&str> for LevelArg {
    fn from(name: &str) -> Self {
        LevelArg::Name(name.to_string())
    }
}

impl From<String> for LevelArg {
    fn from(name: String) -> Self {
        LevelArg::Name(name)
    }
}

/// Elevation rule: every `print_interval`-th step, records below INFO are
/// promoted to INFO so progress stays visible without printing every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPolicy {
    print_interval: u64,
}

impl LevelPolicy {
    pub const ELEVATED: Severity = Severity::Info;

    pub fn new(print_interval: u64) -> StepLogResult<Self> {
        if print_interval == 0 {
            return Err(StepLogError::config("print_interval must be a positive integer"));
        }
        Ok(Self { print_interval })
    }

    pub fn print_interval(&self) -> u64 {
        self.print_interval
    }

    /// True when `step_index` falls on the elevation cadence.
    pub fn elevation_due(&self, step_index: u64) -> bool {
        step_index % self.print_interval == 0
    }

    /// Resolve the effective severity of a record.
    pub fn resolve(&self, level: &LevelArg, elevate_if_due: bool) -> StepLogResult<Severity> {
        let severity = level.to_severity()?;
        if elevate_if_due {
            Ok(severity.max(Self::ELEVATED))
        } else {
            Ok(severity)
        }
    }

    /// Resolve using the cadence of `step_index` directly.
    pub fn resolve_at(&self, level: &LevelArg, step_index: u64) -> StepLogResult<Severity> {
        self.resolve(level, self.elevation_due(step_index))
    }
}
