// step_aggregator.rs
// Purpose: Accumulate metrics for the current, uncommitted step and hand them off once

use crate::errors::{StepLogError, StepLogResult};
use crate::log_record::{MetricValue, Metrics};

/// Namespace separator between a tag and a metric name.
pub const TAG_SEPARATOR: char = '/';

/// Per-step accumulation state. Keys are last-write-wins within a step; the
/// step index starts at 1 and advances by exactly one per `finalize`.
#[derive(Debug)]
pub struct StepAggregator {
    pending: Metrics,
    step_index: u64,
}

impl Default for StepAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StepAggregator {
    pub fn new() -> Self {
        Self {
            pending: Metrics::new(),
            step_index: 1,
        }
    }

    /// Index of the step currently being accumulated.
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn pending(&self) -> &Metrics {
        &self.pending
    }

    /// Build the storage key for `key` under an optional `tag`.
    pub fn storage_key(tag: Option<&str>, key: &str) -> StepLogResult<String> {
        let full = match tag {
            Some(tag) => format!("{tag}{TAG_SEPARATOR}{key}"),
            None => key.to_string(),
        };
        if full.matches(TAG_SEPARATOR).count() > 1 {
            return Err(StepLogError::malformed_key(full));
        }
        Ok(full)
    }

    /// Merge `values` under `tag`. Every key is validated before any is
    /// written, so a rejected call leaves the scope untouched.
    pub fn merge<'a, I>(&mut self, tag: Option<&str>, values: I) -> StepLogResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a MetricValue)>,
    {
        let staged = values
            .into_iter()
            .map(|(key, value)| Ok((Self::storage_key(tag, key)?, value.clone())))
            .collect::<StepLogResult<Vec<_>>>()?;

        for (key, value) in staged {
            self.pending.insert(key, value);
        }
        Ok(())
    }

    /// Take the step's metrics, clear the scope and advance the step index.
    pub fn finalize(&mut self) -> Metrics {
        let snapshot = std::mem::take(&mut self.pending);
        self.step_index += 1;
        snapshot
    }
}
