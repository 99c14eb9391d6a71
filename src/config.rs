// config.rs
// Purpose: Construction-time configuration for a step logger and its sinks

use crate::errors::{StepLogError, StepLogResult};
use crate::log_level::{LevelPolicy, Severity};
use crate::render::TimestampFormat;
use crate::style::{default_level_styles, FieldStyles, StyleSpec, StyleTable, Weight};
use crate::tracker::{AnonymousMode, LoginSettings, RunSettings, TrackerMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Logger name shown as the first column of every record.
    pub name: Option<String>,
    /// Elevation cadence: every `print_interval`-th step is promoted to INFO.
    pub print_interval: u64,
    pub log: LogConfig,
    /// Tracker settings; `None` runs without a tracker.
    pub tracker: Option<TrackerConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: None,
            print_interval: 1,
            log: LogConfig::default(),
            tracker: None,
        }
    }
}

impl LoggerConfig {
    /// Reject settings that can never work. Runs before any sink is touched.
    pub fn validate(&self) -> StepLogResult<()> {
        LevelPolicy::new(self.print_interval)?;
        self.log.style_table()?;
        TimestampFormat::resolve(&self.log.timestamp_format)?;
        if let Some(stem) = &self.log.file_stem {
            if stem.trim().is_empty() || stem.contains(['/', '\\']) {
                return Err(StepLogError::config(format!("invalid file_stem '{stem}'")));
            }
        }
        Ok(())
    }
}

/// Terminal and durable-transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub refresh_dir: bool,
    pub level: Severity,
    pub dir: PathBuf,
    /// Explicit destination name; derived from the tracker run or a
    /// timestamp hash when unset.
    pub file_stem: Option<String>,
    pub save_for_man: bool,
    pub save_as_json: bool,
    pub loggername_style: StyleSpec,
    pub timestamp_style: StyleSpec,
    /// Preset name (`detailed`, `normal`, `short`, `man`) or strftime pattern.
    pub timestamp_format: String,
    pub timestamp_utc: bool,
    pub epoch_style: StyleSpec,
    pub epoch_width: usize,
    pub step_style: StyleSpec,
    pub step_width: usize,
    pub level_styles: BTreeMap<String, StyleSpec>,
    pub event_style: StyleSpec,
    pub metric_style: StyleSpec,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            refresh_dir: false,
            level: Severity::Info,
            dir: PathBuf::from("steplog-logs"),
            file_stem: None,
            save_for_man: true,
            save_as_json: false,
            loggername_style: StyleSpec::new("white", Weight::Dim),
            timestamp_style: StyleSpec::new("white", Weight::Dim),
            timestamp_format: "man".to_string(),
            timestamp_utc: false,
            epoch_style: StyleSpec::new("blue", Weight::Normal),
            epoch_width: 4,
            step_style: StyleSpec::new("blue", Weight::Bright),
            step_width: 4,
            level_styles: default_level_styles(),
            event_style: StyleSpec::new("white", Weight::Normal),
            metric_style: StyleSpec::new("white", Weight::Bright),
        }
    }
}

impl LogConfig {
    pub fn style_table(&self) -> StepLogResult<StyleTable> {
        let fields = FieldStyles {
            logger: &self.loggername_style,
            timestamp: &self.timestamp_style,
            epoch: &self.epoch_style,
            step: &self.step_style,
            event: &self.event_style,
            metric: &self.metric_style,
        };
        StyleTable::from_specs(fields, &self.level_styles)
    }

    pub fn persists(&self) -> bool {
        self.save_for_man || self.save_as_json
    }
}

/// Experiment-tracker settings, mirroring the collaborator's login and
/// run-creation parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub refresh_dir: bool,
    pub mode: TrackerMode,
    /// Tracker root; the log directory is used when unset.
    pub dir: Option<PathBuf>,
    pub anonymous: AnonymousMode,
    pub api_key: Option<String>,
    pub entity: Option<String>,
    pub project: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub config: Option<Value>,
    pub config_exclude_keys: Vec<String>,
    pub config_include_keys: Vec<String>,
}

impl TrackerConfig {
    pub fn root_dir(&self, log_dir: &Path) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| log_dir.to_path_buf())
    }

    pub fn login_settings(&self) -> LoginSettings {
        LoginSettings {
            anonymous: self.anonymous,
            api_key: self.api_key.clone(),
            mode: self.mode,
            force_relogin: true,
        }
    }

    pub fn run_settings(&self, log_dir: &Path) -> RunSettings {
        RunSettings {
            entity: self.entity.clone(),
            project: self.project.clone(),
            dir: self.root_dir(log_dir),
            id: self.id.clone(),
            name: self.name.clone(),
            group: self.group.clone(),
            tags: self.tags.clone(),
            notes: self.notes.clone(),
            mode: self.mode,
            config: self.filtered_config(),
            force_new: self.refresh_dir,
        }
    }

    /// Run config with `config_include_keys` / `config_exclude_keys` applied
    /// to its top-level keys.
    pub fn filtered_config(&self) -> Option<Value> {
        let config = self.config.clone()?;
        let Value::Object(map) = config else {
            return Some(config);
        };
        let filtered = map
            .into_iter()
            .filter(|(k, _)| {
                self.config_include_keys.is_empty() || self.config_include_keys.contains(k)
            })
            .filter(|(k, _)| !self.config_exclude_keys.contains(k))
            .collect();
        Some(Value::Object(filtered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        let config = LoggerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.print_interval, 1);
        assert_eq!(config.log.level, Severity::Info);
        assert!(config.log.save_for_man);
        assert!(!config.log.save_as_json);
    }

    #[test]
    fn zero_interval_fails_validation() {
        let config = LoggerConfig {
            print_interval: 0,
            ..LoggerConfig::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn bad_style_and_stem_fail_validation() {
        let mut config = LoggerConfig::default();
        config.log.event_style = StyleSpec::new("octarine", Weight::Normal);
        assert!(config.validate().is_err());

        let mut config = LoggerConfig::default();
        config.log.file_stem = Some("../escape".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn tracker_config_filters_run_config() {
        let tracker = TrackerConfig {
            config: Some(json!({"lr": 0.1, "seed": 7, "secret": "x"})),
            config_exclude_keys: vec!["secret".into()],
            ..TrackerConfig::default()
        };
        let filtered = tracker.filtered_config().unwrap();
        assert_eq!(filtered, json!({"lr": 0.1, "seed": 7}));

        let only_lr = TrackerConfig {
            config_include_keys: vec!["lr".into()],
            ..tracker
        };
        assert_eq!(only_lr.filtered_config().unwrap(), json!({"lr": 0.1}));
    }

    #[test]
    fn tracker_dir_defaults_to_log_dir() {
        let tracker = TrackerConfig::default();
        let settings = tracker.run_settings(Path::new("logs"));
        assert_eq!(settings.dir, PathBuf::from("logs"));
        assert_eq!(settings.mode, TrackerMode::Offline);
    }
}
