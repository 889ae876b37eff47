use std::io::{self, Write};

use chrono::Local;
use colored::*;
use serde_json::Value;

use crate::core::config::ReporterOptions;
use crate::core::runner::{RunConfig, RunnerHandle, TestSuite};
use crate::core::test::{TestResult, TestStatus};
use crate::reporters::Reporter;

/// Text reporter for console output. Knobs: `verbose`, `quiet`.
pub struct TextReporter {
    verbose: bool,
    quiet: bool,
}

impl TextReporter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Construct from a per-reporter options map; mistyped or missing keys
    /// fall back to defaults.
    pub fn from_options(_runner: &RunnerHandle, options: &ReporterOptions) -> Self {
        Self::new(
            options.get("verbose").and_then(Value::as_bool).unwrap_or(false),
            options.get("quiet").and_then(Value::as_bool).unwrap_or(false),
        )
    }

    /// Format a duration in a human-readable format
    fn format_duration(&self, duration: std::time::Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if seconds > 0 {
            format!("{}s", seconds)
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    /// Format a test status with color
    fn format_status(&self, status: TestStatus) -> ColoredString {
        match status {
            TestStatus::Passed => "✓ PASS".green().bold(),
            TestStatus::Failed => "✗ FAIL".red().bold(),
            TestStatus::Skipped => "⏸ SKIPPED".blue().bold(),
            TestStatus::Pending => "⋯ PENDING".normal(),
            TestStatus::Running => "⟳ RUNNING".cyan().bold(),
        }
    }
}

impl Reporter for TextReporter {
    fn report_start(&self, config: &RunConfig) {
        if self.quiet {
            return;
        }

        let label = config.label.as_deref().unwrap_or("TEST RUN");
        println!("{}", label.to_uppercase().bold());
        println!("{}", "=".repeat(label.len().max(4)));

        let now = Local::now();
        println!("Started: {}", now.format("%Y-%m-%d %H:%M:%S %Z"));
        if self.verbose && config.total_tests > 0 {
            println!("Tests: {}", config.total_tests);
        }

        println!();
        io::stdout().flush().ok();
    }

    fn report_test_start(&self, test_name: &str) {
        if self.quiet {
            return;
        }

        if self.verbose {
            println!("Starting test: {}", test_name.cyan());
        } else {
            print!("{}... ", test_name.cyan());
        }
        io::stdout().flush().ok();
    }

    fn report_test_result(&self, result: &TestResult) {
        if self.quiet {
            return;
        }

        if self.verbose {
            println!(
                "Test {} finished: {} ({})",
                result.name.cyan(),
                self.format_status(result.status),
                self.format_duration(result.duration)
            );
            if let Some(failure) = &result.failure {
                println!("  {}", failure.message);
                if let Some(location) = &failure.location {
                    println!("  at {}", location);
                }
            }
        } else {
            println!("{}", self.format_status(result.status));
        }
        io::stdout().flush().ok();
    }

    fn report_suite_result(&self, suite: &TestSuite) {
        if self.quiet {
            // In quiet mode, just the overall verdict.
            println!("{}", self.format_status(suite.overall_status));
            return;
        }

        println!("\n{}", "RESULTS".bold());
        println!("=======");
        println!("Started: {}", suite.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Duration: {}", self.format_duration(suite.duration));
        println!();

        let max_name_len = suite
            .results
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(10);

        for result in &suite.results {
            println!(
                "{}:{}{}",
                result.name.cyan().bold(),
                " ".repeat(max_name_len - result.name.len() + 2),
                self.format_status(result.status)
            );
            if let Some(failure) = &result.failure {
                println!("{}  {}", " ".repeat(max_name_len + 1), failure.message);
            }
        }

        println!(
            "\n{}: {} ({} passed, {} failed, {} skipped)",
            "OVERALL".bold(),
            self.format_status(suite.overall_status),
            suite.passes,
            suite.failures,
            suite.skipped
        );
    }

    fn report_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        eprintln!("{}: {}", "WARNING".yellow().bold(), message);
    }

    fn report_info(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.verbose {
            println!("{}: {}", "INFO".blue().bold(), message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> ReporterOptions {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_from_options_reads_knobs() {
        let runner = RunnerHandle::new(RunConfig::default());
        let reporter =
            TextReporter::from_options(&runner, &options(json!({"verbose": true})));
        assert!(reporter.verbose);
        assert!(!reporter.quiet);

        let reporter =
            TextReporter::from_options(&runner, &options(json!({"quiet": true, "verbose": "yes"})));
        // Mistyped values fall back to the default.
        assert!(!reporter.verbose);
        assert!(reporter.quiet);
    }

    #[test]
    fn test_format_duration() {
        let reporter = TextReporter::new(false, false);
        assert_eq!(
            reporter.format_duration(std::time::Duration::from_secs(3725)),
            "1h 2m 5s"
        );
        assert_eq!(
            reporter.format_duration(std::time::Duration::from_secs(65)),
            "1m 5s"
        );
        assert_eq!(
            reporter.format_duration(std::time::Duration::from_millis(250)),
            "250ms"
        );
    }
}
