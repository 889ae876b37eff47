use std::fs::File;
use std::io::{self, Write};

use csv::Writer;
use serde_json::Value;

use crate::core::config::ReporterOptions;
use crate::core::runner::{RunConfig, RunnerHandle, TestSuite};
use crate::core::test::{TestResult, TestStatus};
use crate::reporters::Reporter;

/// CSV reporter for spreadsheet-compatible output. Knob: `output` (file
/// path, `{id}`-substitutable); without it rows go to stdout. Writes
/// everything at suite end, synchronously, so it advertises no completion
/// hook.
pub struct CsvReporter {
    output_file: Option<String>,
}

impl CsvReporter {
    pub fn new(output_file: Option<String>) -> Self {
        Self { output_file }
    }

    /// Construct from a per-reporter options map; mistyped or missing keys
    /// fall back to defaults.
    pub fn from_options(_runner: &RunnerHandle, options: &ReporterOptions) -> Self {
        Self::new(
            options
                .get("output")
                .and_then(Value::as_str)
                .map(str::to_string),
        )
    }

    fn status_to_string(status: TestStatus) -> &'static str {
        match status {
            TestStatus::Passed => "PASS",
            TestStatus::Failed => "FAIL",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Pending => "PENDING",
            TestStatus::Running => "RUNNING",
        }
    }

    fn create_writer(&self) -> io::Result<Writer<Box<dyn Write>>> {
        match &self.output_file {
            Some(path) => {
                let file = File::create(path)?;
                Ok(Writer::from_writer(Box::new(file) as Box<dyn Write>))
            }
            None => Ok(Writer::from_writer(Box::new(io::stdout()) as Box<dyn Write>)),
        }
    }

    fn write_suite(&self, suite: &TestSuite) -> csv::Result<()> {
        let mut writer = self.create_writer()?;

        writer.write_record(["Test Name", "Status", "Duration (ms)", "Failure"])?;

        for result in &suite.results {
            let failure = result
                .failure
                .as_ref()
                .map(|f| f.message.as_str())
                .unwrap_or("");

            writer.write_record([
                result.name.as_str(),
                Self::status_to_string(result.status),
                &result.duration.as_millis().to_string(),
                failure,
            ])?;
        }

        writer.write_record([""; 4])?;
        writer.write_record(["Summary", "", "", ""])?;

        let summary_records = [
            ["Test Date", &suite.start_time.format("%Y-%m-%d").to_string(), "", ""],
            ["Test Time", &suite.start_time.format("%H:%M:%S").to_string(), "", ""],
            ["Overall Result", Self::status_to_string(suite.overall_status), "", ""],
            ["Passes", &suite.passes.to_string(), "", ""],
            ["Failures", &suite.failures.to_string(), "", ""],
            ["Skipped", &suite.skipped.to_string(), "", ""],
            ["Duration (ms)", &suite.duration.as_millis().to_string(), "", ""],
        ];
        for record in &summary_records {
            writer.write_record(record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Reporter for CsvReporter {
    fn report_start(&self, _config: &RunConfig) {
        // Nothing until suite end.
    }

    fn report_test_start(&self, _test_name: &str) {}

    fn report_test_result(&self, _result: &TestResult) {}

    fn report_suite_result(&self, suite: &TestSuite) {
        if let Err(e) = self.write_suite(suite) {
            eprintln!("Error writing CSV output: {}", e);
        }
    }

    fn report_warning(&self, _message: &str) {}

    fn report_info(&self, _message: &str) {}
}
