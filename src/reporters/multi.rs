use std::sync::Mutex;

use log::{debug, error, warn};

use crate::core::config::{self, MultiReporterOptions, ReporterOptions};
use crate::core::error::Result;
use crate::core::gate::CompletionGate;
use crate::core::registry::ReporterRegistry;
use crate::core::runner::{RunConfig, RunStats, RunnerHandle, TestSuite};
use crate::core::test::TestResult;
use crate::reporters::{CompletionHook, Reporter};

/// Fan-out reporter: resolves the configured list of reporter names, loads
/// each one, forwards every lifecycle event to all of them and merges their
/// completion signals into a single callback.
///
/// Construction resolves the configuration once; neither the configuration
/// nor the loaded instances change afterwards. A name that resolves through
/// none of the registry tiers is logged and leaves a gap; the remaining
/// reporters still load. An error from a *resolved* reporter's factory is
/// not caught and aborts construction.
pub struct MultiReporter {
    reporters: Vec<Option<Box<dyn Reporter + Send + Sync>>>,
    stats: Mutex<RunStats>,
}

impl MultiReporter {
    /// Build the fan-out against the built-in registry.
    pub fn new(runner: &RunnerHandle, options: &MultiReporterOptions) -> Result<Self> {
        Self::with_registry(&ReporterRegistry::new(), runner, options)
    }

    /// Build the fan-out against a caller-supplied registry (external
    /// reporters installed by name or path).
    pub fn with_registry(
        registry: &ReporterRegistry,
        runner: &RunnerHandle,
        options: &MultiReporterOptions,
    ) -> Result<Self> {
        let resolved = config::resolve_options(&options.reporter_options)?;
        let names = config::enabled_reporters(&resolved);
        debug!("enabled reporters: {:?}", names);

        let mut reporters = Vec::with_capacity(names.len());
        for name in &names {
            let reporter_options = config::reporter_options(&resolved, name);
            reporters.push(Self::load_reporter(registry, name, runner, &reporter_options)?);
        }

        Ok(Self {
            reporters,
            stats: Mutex::new(RunStats::default()),
        })
    }

    fn load_reporter(
        registry: &ReporterRegistry,
        name: &str,
        runner: &RunnerHandle,
        options: &ReporterOptions,
    ) -> Result<Option<Box<dyn Reporter + Send + Sync>>> {
        match registry.resolve(name) {
            // Unguarded: a factory error aborts the whole construction.
            Ok(factory) => factory(runner, options).map(Some),
            Err(failure) => {
                error!("reporter \"{}\" not found", name);
                error!("{}; {}", failure.installed, failure.path);
                Ok(None)
            }
        }
    }

    /// Number of successfully constructed reporters; gaps do not count.
    pub fn constructed(&self) -> usize {
        self.reporters.iter().flatten().count()
    }

    /// Snapshot of the bookkeeping updated as lifecycle events flow through.
    pub fn stats(&self) -> RunStats {
        self.stats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Completion fan-in. Reporters exposing a completion hook each get the
    /// failure count and a shared gate; once every hook has signaled, the
    /// callback fires exactly once with the original failure count. Hooks
    /// may signal in any relative order, including before this method
    /// returns. Reporters without a hook are not waited on.
    ///
    /// With zero constructed reporters the callback is dropped (logged, not
    /// invoked); callers must not rely on it firing in that case. A hook
    /// that never signals means the callback never fires.
    pub fn done(&self, failures: u32, callback: impl FnOnce(u32) + Send + 'static) {
        let constructed: Vec<&(dyn Reporter + Send + Sync)> = self
            .reporters
            .iter()
            .flatten()
            .map(AsRef::as_ref)
            .collect();

        if constructed.is_empty() {
            warn!("done() called with no reporters constructed; dropping the completion callback");
            return;
        }

        let hooks: Vec<&dyn CompletionHook> = constructed
            .iter()
            .filter_map(|reporter| reporter.completion_hook())
            .collect();

        if hooks.is_empty() {
            callback(failures);
            return;
        }

        debug!("waiting on {} completion hooks", hooks.len());
        let gate = CompletionGate::new(hooks.len(), failures, callback);
        for hook in hooks {
            hook.on_done(failures, &gate);
        }
    }

    fn each<F: FnMut(&(dyn Reporter + Send + Sync))>(&self, mut f: F) {
        for reporter in self.reporters.iter().flatten() {
            f(reporter.as_ref());
        }
    }
}

impl Reporter for MultiReporter {
    fn report_start(&self, config: &RunConfig) {
        self.each(|r| r.report_start(config));
    }

    fn report_test_start(&self, test_name: &str) {
        self.stats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .record_test_start();
        self.each(|r| r.report_test_start(test_name));
    }

    fn report_test_result(&self, result: &TestResult) {
        self.stats
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .record_result(result);
        self.each(|r| r.report_test_result(result));
    }

    fn report_suite_result(&self, suite: &TestSuite) {
        self.each(|r| r.report_suite_result(suite));
    }

    fn report_warning(&self, message: &str) {
        self.each(|r| r.report_warning(message));
    }

    fn report_info(&self, message: &str) {
        self.each(|r| r.report_info(message));
    }

    fn completion_hook(&self) -> Option<&dyn CompletionHook> {
        Some(self)
    }
}

/// A manifold is itself a hooked reporter, so one can be nested as a child
/// of another. The inner fan-in runs and forwards to the outer gate. Note
/// that with zero constructed children the inner `done` drops its callback,
/// so the outer gate is never signaled either.
impl CompletionHook for MultiReporter {
    fn on_done(&self, failures: u32, gate: &CompletionGate) {
        let outer = gate.clone();
        self.done(failures, move |_| outer.signal());
    }
}
