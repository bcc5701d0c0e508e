use super::Reporter;

/// Prints progress to the terminal and mirrors it to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl StdoutReporter {
    fn line(marker: &str, message: &str) -> String {
        format!("  {marker} {message}")
    }
}

impl Reporter for StdoutReporter {
    fn started(&self, message: &str) {
        tracing::info!(status = "started", "{message}");
        println!("{}", Self::line("•", message));
    }

    fn succeeded(&self, message: &str) {
        tracing::info!(status = "succeeded", "{message}");
        println!("{}", Self::line("✓", message));
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
        println!("{}", Self::line("⚠", message));
    }

    fn failed(&self, error: &anyhow::Error) {
        tracing::error!(status = "failed", "{error:#}");
        eprintln!("{}", Self::line("✗", &format!("{error:#}")));
    }
}
