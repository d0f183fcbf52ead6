//! Progress reporting while a completion streams in.
//!
//! The CLI uses `IndicatifReporter` for a spinner showing partial node and
//! edge counts. Library callers can use `NoopReporter` or provide their own
//! implementation.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::synth::partial::PartialRevision;

/// Trait for reporting synthesis progress.
pub trait SynthesisReporter: Send + Sync {
    /// A request was issued.
    fn start(&self, task: &str);

    /// A new partial revision of the streamed object is available.
    fn revision(&self, revision: &PartialRevision);

    /// The request finished, successfully or not.
    fn finish(&self);

    /// Display an informational message.
    fn message(&self, msg: &str);
}

/// No-op reporter for library callers that don't need progress output.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl SynthesisReporter for NoopReporter {
    fn start(&self, _task: &str) {}
    fn revision(&self, _revision: &PartialRevision) {}
    fn finish(&self) {}
    fn message(&self, _msg: &str) {}
}

/// Spinner backed by `indicatif`, for CLI use.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    /// A reporter that draws nothing; used in tests and non-TTY output.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})") {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl SynthesisReporter for IndicatifReporter {
    fn start(&self, task: &str) {
        self.bar.reset();
        self.bar.set_message(task.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn revision(&self, revision: &PartialRevision) {
        self.bar.set_message(format!(
            "Generating… {} nodes, {} edges",
            revision.nodes, revision.edges
        ));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn message(&self, msg: &str) {
        self.bar.println(msg);
    }
}
