// log_sink.rs
// Purpose: Write finalized records to the terminal and the durable transcripts

use crate::errors::{StepLogError, StepLogResult};
use crate::log_record::LogRecord;
use crate::render::RecordRenderer;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A destination for rendered records.
pub trait Sink: Send {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn write(&mut self, record: &LogRecord, renderer: &RecordRenderer) -> StepLogResult<()>;

    /// Flush and release anything held by the sink.
    fn close(&mut self) -> StepLogResult<()> {
        Ok(())
    }
}

/// Colored lines to stdout or any other writer.
pub struct TerminalSink {
    out: Box<dyn Write + Send>,
}

impl TerminalSink {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }
}

impl Sink for TerminalSink {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn write(&mut self, record: &LogRecord, renderer: &RecordRenderer) -> StepLogResult<()> {
        writeln!(self.out, "{}", renderer.render_terminal(record))
            .map_err(|e| StepLogError::io("writing terminal record", e))
    }

    fn close(&mut self) -> StepLogResult<()> {
        self.out
            .flush()
            .map_err(|e| StepLogError::io("flushing terminal", e))
    }
}

/// Open, append one line, close. No handle outlives a write, so an
/// interrupted process loses at most the line being written.
fn append_line(path: &Path, line: &str, operation: &str) -> StepLogResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StepLogError::io(format!("opening {}", path.display()), e))?;

    writeln!(file, "{line}").map_err(|e| StepLogError::io(operation, e))
}

/// Durable human-readable transcript (`<stem>@man.log`).
pub struct ManFileSink {
    path: PathBuf,
}

impl ManFileSink {
    pub const SUFFIX: &'static str = "@man.log";

    pub fn new(dir: &Path, stem: &str) -> Self {
        Self {
            path: dir.join(format!("{stem}{}", Self::SUFFIX)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for ManFileSink {
    fn name(&self) -> &'static str {
        "man"
    }

    fn write(&mut self, record: &LogRecord, renderer: &RecordRenderer) -> StepLogResult<()> {
        append_line(&self.path, &renderer.render_man(record), "appending man record")
    }
}

/// Durable machine-readable transcript (`<stem>@json.log`, JSON Lines).
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub const SUFFIX: &'static str = "@json.log";

    pub fn new(dir: &Path, stem: &str) -> Self {
        Self {
            path: dir.join(format!("{stem}{}", Self::SUFFIX)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JsonFileSink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&mut self, record: &LogRecord, renderer: &RecordRenderer) -> StepLogResult<()> {
        let line = renderer.render_json(record)?;
        append_line(&self.path, &line, "appending json record")
    }
}

/// Fans a record out to every configured sink, in order. Threshold filtering
/// happens before a record gets here.
pub struct SinkFanout {
    renderer: RecordRenderer,
    sinks: Vec<Box<dyn Sink>>,
}

impl SinkFanout {
    pub fn new(renderer: RecordRenderer, sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { renderer, sinks }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Write to every sink. The first failure stops the fan-out and is returned.
    pub fn dispatch(&mut self, record: &LogRecord) -> StepLogResult<()> {
        for sink in self.sinks.iter_mut() {
            sink.write(record, &self.renderer)?;
        }
        Ok(())
    }

    /// Close every sink, returning the first failure after trying them all.
    pub fn close(&mut self) -> StepLogResult<()> {
        let mut first_err = None;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.close() {
                tracing::warn!("Failed to close {} sink: {}", sink.name(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
