//! Progress reporting for long-running cloud operations.
//!
//! Reconcilers announce each step with [`Reporter::started`] and close it
//! with either [`Reporter::succeeded`] or [`Reporter::failed`].

pub mod mock;
pub mod stdout;

pub use mock::RecordingReporter;
pub use stdout::StdoutReporter;

/// A single message sent to a reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Started(String),
    Succeeded(String),
    Warning(String),
    Failed(String),
}

/// Where progress goes. Could be a terminal, a log, or a test recorder.
pub trait Reporter: Send + Sync {
    fn started(&self, message: &str);
    fn succeeded(&self, message: &str);
    fn warning(&self, message: &str);
    fn failed(&self, error: &anyhow::Error);
}
