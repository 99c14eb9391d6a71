//! Experiment-tracker boundary.
//!
//! The logger only talks to a tracker through [`TrackerBackend`] (login, run
//! creation) and [`TrackerRun`] (metric upload, finish). [`OfflineTracker`]
//! is the bundled backend: it keeps run history on local disk, the way a
//! tracking client in offline mode does, and never touches the network.

use crate::errors::TrackerError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

/// Whether the tracker may, or must, run without an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnonymousMode {
    #[default]
    Never,
    Allow,
    Must,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerMode {
    Online,
    #[default]
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSettings {
    pub anonymous: AnonymousMode,
    pub api_key: Option<String>,
    pub mode: TrackerMode,
    pub force_relogin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSettings {
    pub entity: Option<String>,
    pub project: Option<String>,
    pub dir: PathBuf,
    pub id: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub mode: TrackerMode,
    pub config: Option<Value>,
    pub force_new: bool,
}

/// An active tracker run.
pub trait TrackerRun: Send {
    fn id(&self) -> &str;

    /// Record `metrics` at `step`. With `commit` unset the backend may keep
    /// buffering the step's row until a later commit or step.
    fn log(&mut self, metrics: &[(&str, f64)], step: u64, commit: bool) -> Result<(), TrackerError>;

    fn finish(&mut self) -> Result<(), TrackerError>;
}

/// Factory for tracker runs.
pub trait TrackerBackend {
    fn login(&mut self, settings: &LoginSettings) -> Result<(), TrackerError>;

    fn init(&mut self, settings: &RunSettings) -> Result<Box<dyn TrackerRun>, TrackerError>;
}

/// Local-disk tracker backend. Runs live under `<dir>/tracker/<run-id>/`.
#[derive(Debug, Default)]
pub struct OfflineTracker {
    logged_in: bool,
}

impl OfflineTracker {
    pub const SUBDIR: &'static str = "tracker";

    pub fn new() -> Self {
        Self::default()
    }

    fn new_run_id() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }
}

impl TrackerBackend for OfflineTracker {
    fn login(&mut self, settings: &LoginSettings) -> Result<(), TrackerError> {
        match (settings.anonymous, settings.api_key.as_deref(), settings.mode) {
            (AnonymousMode::Must, Some(_), _) => {
                return Err(TrackerError::Login(
                    "anonymous mode 'must' cannot be combined with an API key".into(),
                ))
            }
            (AnonymousMode::Never, None, TrackerMode::Online) => {
                return Err(TrackerError::Login(
                    "an API key is required when anonymous mode is 'never'".into(),
                ))
            }
            _ => {}
        }
        if self.logged_in && !settings.force_relogin {
            return Ok(());
        }
        self.logged_in = true;
        Ok(())
    }

    fn init(&mut self, settings: &RunSettings) -> Result<Box<dyn TrackerRun>, TrackerError> {
        if !self.logged_in {
            return Err(TrackerError::Unavailable("login required before init".into()));
        }
        if settings.mode == TrackerMode::Online {
            return Err(TrackerError::Unavailable(
                "online runs need a remote tracking client; only offline runs are supported".into(),
            ));
        }

        let id = settings.id.clone().unwrap_or_else(Self::new_run_id);
        let dir = settings.dir.join(Self::SUBDIR).join(&id);
        if settings.force_new && dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let manifest = serde_json::json!({
            "id": id,
            "settings": settings,
            "startedAt": Utc::now(),
        });
        fs::write(dir.join("run.json"), serde_json::to_string_pretty(&manifest)?)?;
        tracing::info!("Offline tracker run {} at {}", id, dir.display());

        Ok(Box::new(OfflineRun {
            id,
            dir,
            open_row: None,
            last_step: None,
            summary: Map::new(),
            finished: false,
        }))
    }
}

/// A run recorded to `history.jsonl` and `summary.json`.
#[derive(Debug)]
pub struct OfflineRun {
    id: String,
    dir: PathBuf,
    open_row: Option<(u64, Map<String, Value>)>,
    last_step: Option<u64>,
    summary: Map<String, Value>,
    finished: bool,
}

impl OfflineRun {
    fn flush_row(&mut self) -> Result<(), TrackerError> {
        let Some((step, row)) = self.open_row.take() else {
            return Ok(());
        };
        self.last_step = Some(step);
        if row.is_empty() {
            return Ok(());
        }

        let mut line = Map::new();
        line.insert("_step".into(), Value::from(step));
        for (k, v) in &row {
            line.insert(k.clone(), v.clone());
            self.summary.insert(k.clone(), v.clone());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("history.jsonl"))?;
        writeln!(file, "{}", serde_json::to_string(&Value::Object(line))?)?;
        Ok(())
    }
}

impl TrackerRun for OfflineRun {
    fn id(&self) -> &str {
        &self.id
    }

    fn log(&mut self, metrics: &[(&str, f64)], step: u64, commit: bool) -> Result<(), TrackerError> {
        if self.finished {
            return Err(TrackerError::Finished);
        }
        if self.last_step.is_some_and(|last| step < last) {
            tracing::warn!("Dropping tracker row for step {} behind step {:?}", step, self.last_step);
            return Ok(());
        }
        if self.open_row.as_ref().is_some_and(|(open, _)| *open != step) {
            self.flush_row()?;
        }

        let (_, row) = self.open_row.get_or_insert_with(|| (step, Map::new()));
        for (k, v) in metrics {
            row.insert((*k).to_string(), Value::from(*v));
        }

        if commit {
            self.flush_row()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TrackerError> {
        if self.finished {
            return Err(TrackerError::Finished);
        }
        self.flush_row()?;
        fs::write(
            self.dir.join("summary.json"),
            serde_json::to_string_pretty(&Value::Object(self.summary.clone()))?,
        )?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn login(mode: TrackerMode) -> LoginSettings {
        LoginSettings {
            anonymous: AnonymousMode::Allow,
            api_key: None,
            mode,
            force_relogin: true,
        }
    }

    fn run_settings(dir: &Path) -> RunSettings {
        RunSettings {
            entity: None,
            project: Some("demo".into()),
            dir: dir.to_path_buf(),
            id: Some("run00001".into()),
            name: None,
            group: None,
            tags: vec!["unit".into()],
            notes: None,
            mode: TrackerMode::Offline,
            config: None,
            force_new: true,
        }
    }

    fn history(dir: &Path) -> Vec<Value> {
        fs::read_to_string(dir.join("tracker/run00001/history.jsonl"))
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn login_checks_anonymous_mode() {
        let mut tracker = OfflineTracker::new();
        let mut settings = login(TrackerMode::Offline);
        settings.anonymous = AnonymousMode::Must;
        settings.api_key = Some("secret".into());
        assert!(matches!(tracker.login(&settings), Err(TrackerError::Login(_))));

        let mut online = login(TrackerMode::Online);
        online.anonymous = AnonymousMode::Never;
        assert!(tracker.login(&online).is_err());

        assert!(tracker.login(&login(TrackerMode::Offline)).is_ok());
    }

    #[test]
    fn init_requires_login_and_offline_mode() {
        let temp_dir = tempdir().unwrap();
        let mut tracker = OfflineTracker::new();
        assert!(tracker.init(&run_settings(temp_dir.path())).is_err());

        tracker.login(&login(TrackerMode::Offline)).unwrap();
        let mut online = run_settings(temp_dir.path());
        online.mode = TrackerMode::Online;
        assert!(matches!(tracker.init(&online), Err(TrackerError::Unavailable(_))));

        let run = tracker.init(&run_settings(temp_dir.path())).unwrap();
        assert_eq!(run.id(), "run00001");
        assert!(temp_dir.path().join("tracker/run00001/run.json").exists());
    }

    #[test]
    fn uncommitted_rows_wait_for_commit_or_next_step() {
        let temp_dir = tempdir().unwrap();
        let mut tracker = OfflineTracker::new();
        tracker.login(&login(TrackerMode::Offline)).unwrap();
        let mut run = tracker.init(&run_settings(temp_dir.path())).unwrap();

        run.log(&[("loss", 1.0)], 1, false).unwrap();
        assert!(history(temp_dir.path()).is_empty());

        run.log(&[("loss", 0.8)], 2, false).unwrap();
        assert_eq!(history(temp_dir.path()).len(), 1);

        run.log(&[("acc", 0.5)], 2, true).unwrap();
        let rows = history(temp_dir.path());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["_step"], 2);
        assert_eq!(rows[1]["loss"], 0.8);
        assert_eq!(rows[1]["acc"], 0.5);
    }

    #[test]
    fn finish_flushes_and_writes_summary() {
        let temp_dir = tempdir().unwrap();
        let mut tracker = OfflineTracker::new();
        tracker.login(&login(TrackerMode::Offline)).unwrap();
        let mut run = tracker.init(&run_settings(temp_dir.path())).unwrap();

        run.log(&[("loss", 1.0)], 1, true).unwrap();
        run.log(&[("loss", 0.5)], 2, false).unwrap();
        run.log(&[], 2, true).unwrap();
        run.finish().unwrap();

        assert_eq!(history(temp_dir.path()).len(), 2);
        let summary: Value = serde_json::from_str(
            &fs::read_to_string(temp_dir.path().join("tracker/run00001/summary.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["loss"], 0.5);

        assert!(matches!(run.log(&[("loss", 0.1)], 3, true), Err(TrackerError::Finished)));
        assert!(run.finish().is_err());
    }
}
