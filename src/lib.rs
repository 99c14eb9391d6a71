//! Library root for the `steplog` crate
//! Structured, step-aggregating event and metric logging for training loops

// Core error handling
pub mod errors;

// Records & severity
pub mod log_level;
pub mod log_record;
pub mod step_aggregator;

// Rendering & sinks
pub mod fs_utils;
pub mod log_sink;
pub mod render;
pub mod style;

// Experiment tracker
pub mod tracker;

// Configuration
pub mod config;
pub mod config_loader;

// Facade
pub mod logger;

pub use config::{LogConfig, LoggerConfig, TrackerConfig};
pub use config_loader::load_config;
pub use errors::{StepLogError, StepLogResult, TrackerError};
pub use log_level::{LevelArg, LevelPolicy, Severity};
pub use log_record::{ExceptionInfo, LogFields, LogRecord, MetricValue, Metrics};
pub use logger::{
    CommittedStep, ErrorOutcome, HaltPolicy, LoggerState, StepLogger, StepLoggerBuilder,
};
pub use tracker::{OfflineTracker, TrackerBackend, TrackerRun};
