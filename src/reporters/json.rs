use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;

use serde_json::{json, Value};
use sysinfo::System;

use crate::core::config::ReporterOptions;
use crate::core::gate::CompletionGate;
use crate::core::runner::{RunConfig, RunnerHandle, TestSuite};
use crate::core::test::{TestResult, TestStatus};
use crate::reporters::{CompletionHook, Reporter};

/// JSON reporter for machine-readable output. Knobs: `output` (file path,
/// `{id}`-substitutable), `verbose` (stream lifecycle events to stdout when
/// not writing to a file).
///
/// With an `output` path the final document is buffered at suite end and
/// flushed by the completion hook, so the file only appears once the host
/// calls `done`.
pub struct JsonReporter {
    output_file: Option<String>,
    verbose: bool,
    document: Mutex<Option<Value>>,
}

impl JsonReporter {
    pub fn new(output_file: Option<String>, verbose: bool) -> Self {
        Self {
            output_file,
            verbose,
            document: Mutex::new(None),
        }
    }

    /// Construct from a per-reporter options map; mistyped or missing keys
    /// fall back to defaults.
    pub fn from_options(_runner: &RunnerHandle, options: &ReporterOptions) -> Self {
        Self::new(
            options
                .get("output")
                .and_then(Value::as_str)
                .map(str::to_string),
            options.get("verbose").and_then(Value::as_bool).unwrap_or(false),
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

    /// Stream an event object to stdout. Only used when no output file is
    /// configured, so events never interleave with the final document file.
    fn emit_event(&self, event: Value) {
        if self.verbose && self.output_file.is_none() {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{}", line);
            }
        }
    }

    fn system_block() -> Value {
        let mut system = System::new_all();
        system.refresh_all();

        json!({
            "hostname": System::host_name().unwrap_or_else(|| "unknown".to_string()),
            "os": format!(
                "{} {}",
                System::name().unwrap_or_else(|| "Unknown".to_string()),
                System::os_version().unwrap_or_else(|| "Unknown".to_string())
            ),
            "cpu": system.global_cpu_info().brand().to_string(),
            "memory_gb": system.total_memory() / 1024 / 1024 / 1024,
        })
    }

    fn build_document(suite: &TestSuite) -> Value {
        let test_results: Vec<Value> = suite
            .results
            .iter()
            .map(|result| {
                json!({
                    "name": result.name,
                    "result": Self::status_to_string(result.status),
                    "duration_ms": result.duration.as_millis() as u64,
                    "failure": result.failure.as_ref().map(|f| {
                        json!({
                            "message": f.message,
                            "location": f.location,
                        })
                    }),
                })
            })
            .collect();

        json!({
            "summary": {
                "result": Self::status_to_string(suite.overall_status),
                "passes": suite.passes,
                "failures": suite.failures,
                "skipped": suite.skipped,
                "duration_ms": suite.duration.as_millis() as u64,
                "timestamp": suite.start_time.to_rfc3339(),
                "system": Self::system_block(),
            },
            "tests": test_results,
        })
    }

    fn write_to_file(&self, path: &str, document: &Value) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(document)?;
        let mut file = File::create(path)?;
        file.write_all(contents.as_bytes())
    }
}

impl Reporter for JsonReporter {
    fn report_start(&self, config: &RunConfig) {
        self.emit_event(json!({
            "event": "run_start",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "label": config.label,
            "total_tests": config.total_tests,
        }));
    }

    fn report_test_start(&self, test_name: &str) {
        self.emit_event(json!({
            "event": "test_start",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "test_name": test_name,
        }));
    }

    fn report_test_result(&self, result: &TestResult) {
        self.emit_event(json!({
            "event": "test_result",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "test_name": result.name,
            "status": Self::status_to_string(result.status),
            "duration_ms": result.duration.as_millis() as u64,
        }));
    }

    fn report_suite_result(&self, suite: &TestSuite) {
        let document = Self::build_document(suite);

        if self.output_file.is_some() {
            // Deferred: the completion hook flushes the file.
            *self.document.lock().unwrap_or_else(|p| p.into_inner()) = Some(document);
        } else {
            match serde_json::to_string_pretty(&document) {
                Ok(contents) => println!("{}", contents),
                Err(e) => eprintln!("Error serializing JSON output: {}", e),
            }
        }
    }

    fn report_warning(&self, message: &str) {
        self.emit_event(json!({
            "event": "warning",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "message": message,
        }));
    }

    fn report_info(&self, message: &str) {
        self.emit_event(json!({
            "event": "info",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "message": message,
        }));
    }

    fn completion_hook(&self) -> Option<&dyn CompletionHook> {
        Some(self)
    }
}

impl CompletionHook for JsonReporter {
    fn on_done(&self, _failures: u32, gate: &CompletionGate) {
        let document = self
            .document
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();

        if let (Some(path), Some(document)) = (&self.output_file, document) {
            if let Err(e) = self.write_to_file(path, &document) {
                eprintln!("Error writing JSON output to {}: {}", path, e);
            }
        }

        // Signal even after a write error; the run must not hang on us.
        gate.signal();
    }
}
