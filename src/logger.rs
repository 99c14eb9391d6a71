//! The step logger facade.
//!
//! A [`StepLogger`] owns its sinks, its aggregation scope and its tracker run.
//! Callers `add` metrics any number of times per step and `commit` once; each
//! commit writes exactly one record to the terminal and durable sinks and
//! sends at most one update to the tracker.
//!
//! The logger takes `&mut self` everywhere and holds no locks: one caller
//! drives it. Share it across threads only behind your own synchronization.

use crate::config::{LoggerConfig, TrackerConfig};
use crate::errors::{StepLogError, StepLogResult};
use crate::fs_utils::{prepare_dir, timestamp_stem};
use crate::log_level::{LevelArg, LevelPolicy, Severity};
use crate::log_record::{LogFields, LogRecord, Metrics};
use crate::log_sink::{JsonFileSink, ManFileSink, Sink, SinkFanout, TerminalSink};
use crate::render::RecordRenderer;
use crate::step_aggregator::StepAggregator;
use crate::tracker::{OfflineTracker, TrackerBackend, TrackerRun};
use chrono::Local;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Active,
    Closed,
}

/// What `error` should do after emitting its record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HaltPolicy {
    /// Close the logger and ask the host to exit.
    #[default]
    Halt,
    /// Keep the logger active.
    Continue,
}

/// Signal returned by [`StepLogger::error`]. The logger never exits the
/// process itself; the host decides.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOutcome {
    Continue,
    Halt { exit_code: i32 },
}

impl ErrorOutcome {
    pub fn is_halt(&self) -> bool {
        matches!(self, ErrorOutcome::Halt { .. })
    }

    /// Terminate the process if a halt was requested.
    pub fn exit_if_halted(self) {
        if let ErrorOutcome::Halt { exit_code } = self {
            std::process::exit(exit_code);
        }
    }
}

/// Result of one `commit`.
#[derive(Debug, Clone)]
pub struct CommittedStep {
    /// Index the step was committed under (and sent to the tracker with).
    pub step_index: u64,
    pub severity: Severity,
    /// Whether the step fell on the elevation cadence; also the tracker's
    /// commit flag.
    pub elevated: bool,
    pub metrics: Metrics,
}

/// Wires a [`StepLogger`] from a config, an optional tracker backend and an
/// optional terminal writer (stdout by default).
pub struct StepLoggerBuilder {
    config: LoggerConfig,
    tracker: Option<Box<dyn TrackerBackend>>,
    terminal: Option<Box<dyn Write + Send>>,
}

impl StepLoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            tracker: None,
            terminal: None,
        }
    }

    /// Use `backend` instead of the bundled [`OfflineTracker`]. Enables the
    /// tracker with default settings when the config has no tracker section.
    pub fn tracker_backend(mut self, backend: Box<dyn TrackerBackend>) -> Self {
        self.tracker = Some(backend);
        self
    }

    pub fn terminal_writer(mut self, out: Box<dyn Write + Send>) -> Self {
        self.terminal = Some(out);
        self
    }

    pub fn build(self) -> StepLogResult<StepLogger> {
        let StepLoggerBuilder {
            config,
            tracker,
            terminal,
        } = self;

        config.validate()?;
        let policy = LevelPolicy::new(config.print_interval)?;
        let log = &config.log;
        let renderer = RecordRenderer::new(
            &log.timestamp_format,
            log.timestamp_utc,
            log.epoch_width,
            log.step_width,
            log.style_table()?,
        )?;

        // The log directory is refreshed before the tracker starts, since the
        // tracker may keep its runs underneath it.
        if log.persists() {
            prepare_dir(&log.dir, log.refresh_dir)?;
        }

        let tracker_config = config
            .tracker
            .clone()
            .or_else(|| tracker.is_some().then(TrackerConfig::default));
        let mut notices = Vec::new();
        let tracker_run = match tracker_config {
            Some(tracker_config) => {
                let backend: Box<dyn TrackerBackend> = match tracker {
                    Some(backend) => backend,
                    None => Box::new(OfflineTracker::new()),
                };
                match start_tracker(&tracker_config, &log.dir, backend) {
                    Ok(run) => Some(run),
                    Err(e) => {
                        tracing::warn!("Tracker disabled: {}", e);
                        notices.push(format!("Tracker features will be disabled: {e}"));
                        None
                    }
                }
            }
            None => None,
        };

        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        let mut durable_paths = Vec::new();
        if log.persists() {
            let stem = log
                .file_stem
                .clone()
                .or_else(|| tracker_run.as_ref().map(|run| run.id().to_string()))
                .unwrap_or_else(|| timestamp_stem(Local::now()));

            if log.save_for_man {
                let sink = ManFileSink::new(&log.dir, &stem);
                durable_paths.push(sink.path().to_path_buf());
                sinks.push(Box::new(sink));
            }
            if log.save_as_json {
                let sink = JsonFileSink::new(&log.dir, &stem);
                durable_paths.push(sink.path().to_path_buf());
                sinks.push(Box::new(sink));
            }
            tracing::debug!("Durable sinks: {:?}", durable_paths);
        }
        let terminal = match terminal {
            Some(out) => TerminalSink::new(out),
            None => TerminalSink::stdout(),
        };
        sinks.push(Box::new(terminal));

        let mut logger = StepLogger {
            name: config.name.clone(),
            threshold: log.level,
            policy,
            aggregator: StepAggregator::new(),
            fanout: SinkFanout::new(renderer, sinks),
            tracker: tracker_run,
            state: LoggerState::Active,
            durable_paths,
        };
        for notice in notices {
            logger.warn(LogFields::event_only(notice))?;
        }
        Ok(logger)
    }
}

fn start_tracker(
    config: &TrackerConfig,
    log_dir: &Path,
    mut backend: Box<dyn TrackerBackend>,
) -> StepLogResult<Box<dyn TrackerRun>> {
    backend
        .login(&config.login_settings())
        .map_err(|e| StepLogError::tracker("login", e))?;

    let root = config.root_dir(log_dir);
    prepare_dir(&root.join(OfflineTracker::SUBDIR), config.refresh_dir)?;

    backend
        .init(&config.run_settings(log_dir))
        .map_err(|e| StepLogError::tracker("init", e))
}

/// Step-aggregating logger with terminal, durable and tracker sinks.
pub struct StepLogger {
    name: Option<String>,
    threshold: Severity,
    policy: LevelPolicy,
    aggregator: StepAggregator,
    fanout: SinkFanout,
    tracker: Option<Box<dyn TrackerRun>>,
    state: LoggerState,
    durable_paths: Vec<PathBuf>,
}

impl StepLogger {
    /// Build a logger using the bundled offline tracker when the config has a
    /// tracker section.
    pub fn new(config: LoggerConfig) -> StepLogResult<Self> {
        StepLoggerBuilder::new(config).build()
    }

    pub fn builder(config: LoggerConfig) -> StepLoggerBuilder {
        StepLoggerBuilder::new(config)
    }

    pub fn state(&self) -> LoggerState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == LoggerState::Closed
    }

    /// Index of the step currently being accumulated; starts at 1.
    pub fn step_index(&self) -> u64 {
        self.aggregator.step_index()
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn print_interval(&self) -> u64 {
        self.policy.print_interval()
    }

    /// Metrics merged since the last commit.
    pub fn pending_metrics(&self) -> &Metrics {
        self.aggregator.pending()
    }

    pub fn tracker_run_id(&self) -> Option<&str> {
        self.tracker.as_ref().map(|run| run.id())
    }

    /// Paths of the durable transcripts, man first.
    pub fn durable_paths(&self) -> &[PathBuf] {
        &self.durable_paths
    }

    fn ensure_active(&self) -> StepLogResult<()> {
        match self.state {
            LoggerState::Active => Ok(()),
            LoggerState::Closed => Err(StepLogError::Closed),
        }
    }

    /// Write one record to the terminal and durable sinks. Records below the
    /// threshold are dropped. Never reaches the tracker.
    pub fn emit(&mut self, severity: Severity, fields: LogFields) -> StepLogResult<()> {
        self.ensure_active()?;
        if severity < self.threshold {
            return Ok(());
        }
        let record = LogRecord::new(severity, self.name.clone(), fields);
        self.fanout.dispatch(&record)
    }

    pub fn debug(&mut self, fields: LogFields) -> StepLogResult<()> {
        self.emit(Severity::Debug, fields)
    }

    pub fn train(&mut self, fields: LogFields) -> StepLogResult<()> {
        self.emit(Severity::Train, fields)
    }

    pub fn info(&mut self, fields: LogFields) -> StepLogResult<()> {
        self.emit(Severity::Info, fields)
    }

    pub fn test(&mut self, fields: LogFields) -> StepLogResult<()> {
        self.emit(Severity::Test, fields)
    }

    pub fn warn(&mut self, fields: LogFields) -> StepLogResult<()> {
        self.emit(Severity::Warn, fields)
    }

    /// Emit at ERROR. With [`HaltPolicy::Halt`] the logger is then closed and
    /// a halt is signalled even if emitting or closing failed.
    pub fn error(&mut self, fields: LogFields, halt: HaltPolicy) -> StepLogResult<ErrorOutcome> {
        let emitted = self.emit(Severity::Error, fields);
        match halt {
            HaltPolicy::Continue => emitted.map(|_| ErrorOutcome::Continue),
            HaltPolicy::Halt => {
                if let Err(e) = emitted {
                    tracing::error!("Failed to record error before halting: {}", e);
                }
                if let Err(e) = self.close() {
                    tracing::warn!("Failed to close logger before halting: {}", e);
                }
                Ok(ErrorOutcome::Halt { exit_code: 1 })
            }
        }
    }

    /// Merge `fields.metrics` into the current step under `tag`. When an event
    /// message is present it is also emitted right away, elevated on the
    /// step's cadence, carrying only the event, epoch and step.
    pub fn add(
        &mut self,
        level: impl Into<LevelArg>,
        tag: Option<&str>,
        fields: LogFields,
    ) -> StepLogResult<()> {
        self.ensure_active()?;
        let level = level.into();
        let elevated = self.policy.elevation_due(self.step_index());
        let severity = self.policy.resolve(&level, elevated)?;

        let LogFields {
            event,
            epoch,
            step,
            metrics,
            exception,
        } = fields;
        self.aggregator.merge(tag, metrics.iter())?;

        if event.is_some() {
            self.emit(
                severity,
                LogFields {
                    event,
                    epoch,
                    step,
                    metrics: Metrics::new(),
                    exception,
                },
            )?;
        }
        Ok(())
    }

    /// Close the current step: one record with everything accumulated since
    /// the previous commit, one tracker update, then the scope is cleared and
    /// the step index advances by one. Metrics on `fields` are merged
    /// untagged before the step is finalized.
    pub fn commit(
        &mut self,
        level: impl Into<LevelArg>,
        fields: LogFields,
    ) -> StepLogResult<CommittedStep> {
        self.ensure_active()?;
        let level = level.into();
        let step_index = self.step_index();
        let elevated = self.policy.elevation_due(step_index);
        let severity = self.policy.resolve(&level, elevated)?;

        let LogFields {
            event,
            epoch,
            step,
            metrics,
            exception,
        } = fields;
        self.aggregator.merge(None, metrics.iter())?;
        let snapshot = self.aggregator.finalize();

        self.emit(
            severity,
            LogFields {
                event,
                epoch,
                step,
                metrics: snapshot.clone(),
                exception,
            },
        )?;
        self.forward_to_tracker(&snapshot, step_index, elevated)?;

        Ok(CommittedStep {
            step_index,
            severity,
            elevated,
            metrics: snapshot,
        })
    }

    fn forward_to_tracker(
        &mut self,
        snapshot: &Metrics,
        step_index: u64,
        commit: bool,
    ) -> StepLogResult<()> {
        let Some(run) = self.tracker.as_mut() else {
            return Ok(());
        };
        let numeric = snapshot.numeric();
        if let Err(e) = run.log(&numeric, step_index, commit) {
            tracing::warn!("Tracker upload failed at step {}: {}", step_index, e);
            self.warn(
                LogFields::event_only(format!("Tracker upload failed: {e}")).step(step_index),
            )?;
        }
        Ok(())
    }

    /// Flush the terminal, flush and finish the tracker run, and move to
    /// `Closed`. Closing a closed logger does nothing.
    pub fn close(&mut self) -> StepLogResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = LoggerState::Closed;

        let mut result = self.fanout.close();
        if let Some(mut run) = self.tracker.take() {
            let last_step = self.step_index().saturating_sub(1);
            let finished = run
                .log(&[], last_step, true)
                .and_then(|_| run.finish())
                .map_err(|e| StepLogError::tracker("finish", e));
            if let Err(e) = finished {
                tracing::warn!("Failed to finish tracker run {}: {}", run.id(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        tracing::debug!("Logger closed at step {}", self.step_index());
        result
    }
}

impl fmt::Debug for StepLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepLogger")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .field("print_interval", &self.policy.print_interval())
            .field("step_index", &self.step_index())
            .field("state", &self.state)
            .field("tracker_run", &self.tracker_run_id())
            .field("durable_paths", &self.durable_paths)
            .finish_non_exhaustive()
    }
}

impl Drop for StepLogger {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close logger on drop: {}", e);
        }
    }
}
