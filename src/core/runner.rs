use std::sync::Arc;
use serde::{Serialize, Deserialize};
use crate::core::test::{TestResult, TestStatus};

/// What the hosting harness announces about the run at start time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub label: Option<String>,
    pub total_tests: usize,
}

/// Cheap cloneable handle to the hosting runner, passed to every reporter
/// when it is constructed.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    config: Arc<RunConfig>,
}

impl RunnerHandle {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

/// Collection of test results
#[derive(Debug)]
pub struct TestSuite {
    pub results: Vec<TestResult>,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub duration: std::time::Duration,
    pub passes: usize,
    pub failures: usize,
    pub skipped: usize,
    pub overall_status: TestStatus,
}

impl TestSuite {
    /// Create a new test suite
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            start_time: chrono::Utc::now(),
            end_time: None,
            duration: std::time::Duration::from_secs(0),
            passes: 0,
            failures: 0,
            skipped: 0,
            overall_status: TestStatus::Pending,
        }
    }

    /// Tally the counts, set the end time and the overall status
    pub fn finalize(&mut self) {
        // Set end time and calculate duration
        let end = chrono::Utc::now();
        self.end_time = Some(end);
        self.duration = (end - self.start_time).to_std().unwrap_or_default();

        self.passes = self.results.iter()
            .filter(|r| r.status == TestStatus::Passed)
            .count();
        self.failures = self.results.iter()
            .filter(|r| r.status == TestStatus::Failed)
            .count();
        self.skipped = self.results.iter()
            .filter(|r| r.status == TestStatus::Skipped)
            .count();

        self.overall_status = if self.failures > 0 {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        };
    }
}

/// Bookkeeping the fan-out keeps as lifecycle events flow through it.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub started: usize,
    pub passes: usize,
    pub failures: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn record_test_start(&mut self) {
        self.started += 1;
    }

    pub fn record_result(&mut self, result: &TestResult) {
        match result.status {
            TestStatus::Passed => self.passes += 1,
            TestStatus::Failed => self.failures += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Pending | TestStatus::Running => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_finalize_counts_and_status() {
        let mut suite = TestSuite::new();
        suite.results.push(TestResult::passed("a", Duration::from_secs(1)));
        suite.results.push(TestResult::failed("b", Duration::from_secs(1), "boom"));
        suite.results.push(TestResult::skipped("c"));
        suite.finalize();

        assert_eq!(suite.passes, 1);
        assert_eq!(suite.failures, 1);
        assert_eq!(suite.skipped, 1);
        assert_eq!(suite.overall_status, TestStatus::Failed);
        assert!(suite.end_time.is_some());
    }

    #[test]
    fn test_finalize_all_passing() {
        let mut suite = TestSuite::new();
        suite.results.push(TestResult::passed("a", Duration::from_secs(1)));
        suite.finalize();

        assert_eq!(suite.overall_status, TestStatus::Passed);
        assert_eq!(suite.failures, 0);
    }

    #[test]
    fn test_run_stats_recording() {
        let mut stats = RunStats::default();
        stats.record_test_start();
        stats.record_test_start();
        stats.record_result(&TestResult::passed("a", Duration::from_secs(0)));
        stats.record_result(&TestResult::failed("b", Duration::from_secs(0), "boom"));

        assert_eq!(stats.started, 2);
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.skipped, 0);
    }
}
