pub mod csv;
pub mod json;
pub mod multi;
pub mod text;

use crate::core::gate::CompletionGate;
use crate::core::runner::{RunConfig, TestSuite};
use crate::core::test::TestResult;

/// Reporter trait for outputting test results
pub trait Reporter {
    /// Report the start of testing
    fn report_start(&self, config: &RunConfig);

    /// Report the start of a specific test
    fn report_test_start(&self, test_name: &str);

    /// Report the result of a specific test
    fn report_test_result(&self, result: &TestResult);

    /// Report the final results of the test suite
    fn report_suite_result(&self, suite: &TestSuite);

    /// Report a warning message
    fn report_warning(&self, message: &str);

    /// Report an informational message
    fn report_info(&self, message: &str);

    /// Reporters that finish output after the run (flushing a file, say)
    /// return `Some(self)`; the default advertises no hook.
    fn completion_hook(&self) -> Option<&dyn CompletionHook> {
        None
    }
}

/// Deferred-completion side of the reporter contract. Implementors must
/// arrange for `gate.signal()` to be called exactly once when their output
/// is fully flushed, synchronously or later from another thread.
pub trait CompletionHook {
    fn on_done(&self, failures: u32, gate: &CompletionGate);
}
