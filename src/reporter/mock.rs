use std::sync::Mutex;

use super::{Report, Reporter};

/// A reporter for tests. Records every message in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far.
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn push(&self, report: Report) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

impl Reporter for RecordingReporter {
    fn started(&self, message: &str) {
        self.push(Report::Started(message.to_string()));
    }

    fn succeeded(&self, message: &str) {
        self.push(Report::Succeeded(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(Report::Warning(message.to_string()));
    }

    fn failed(&self, error: &anyhow::Error) {
        self.push(Report::Failed(format!("{error:#}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let reporter = RecordingReporter::new();
        reporter.started("a");
        reporter.warning("b");
        reporter.failed(&anyhow::anyhow!("c"));

        assert_eq!(
            reporter.reports(),
            vec![
                Report::Started("a".to_string()),
                Report::Warning("b".to_string()),
                Report::Failed("c".to_string()),
            ]
        );
    }

    #[test]
    fn failed_includes_context_chain() {
        let reporter = RecordingReporter::new();
        reporter.failed(&anyhow::anyhow!("inner").context("outer"));
        assert_eq!(reporter.reports(), vec![Report::Failed("outer: inner".to_string())]);
    }
}
