use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde_json::{json, Value};
use simple_logger::SimpleLogger;

use manifold::core::config::{self, MultiReporterOptions};
use manifold::core::registry::ReporterRegistry;
use manifold::core::runner::{RunConfig, RunnerHandle, TestSuite};
use manifold::core::test::TestResult;
use manifold::reporters::multi::MultiReporter;
use manifold::reporters::Reporter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Custom configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated reporter names, overriding the configured list
    #[arg(short, long)]
    reporters: Option<String>,

    /// Output override: name+key+value entries joined by ':'
    #[arg(short, long)]
    output_override: Option<String>,

    /// Verbose reporter output and debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress console reporter output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the configuration and show whether each enabled reporter loads
    Check,

    /// Construct the fan-out and drive a synthetic suite through it
    Preview {
        /// Inject a failing test into the synthetic suite
        #[arg(long)]
        fail: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    SimpleLogger::new()
        .with_level(log_level)
        .init()
        .context("Failed to initialize logger")?;

    let options = inline_options(&cli);

    match cli.command {
        Commands::Check => check(&options),
        Commands::Preview { fail } => preview(&options, fail),
    }
}

/// Map CLI flags onto the inline options mapping the fan-out consumes.
fn inline_options(cli: &Cli) -> MultiReporterOptions {
    let mut options = MultiReporterOptions::new();
    if let Some(path) = &cli.config {
        options = options.with_config_file(&path.to_string_lossy());
    }
    if let Some(reporters) = &cli.reporters {
        options = options.with_enabled(reporters);
    }
    if let Some(spec) = &cli.output_override {
        options = options.with_output_override(spec);
    }
    if cli.verbose {
        options = options.with_common_option("verbose", json!(true));
    }
    if cli.quiet {
        options = options.with_common_option("quiet", json!(true));
    }
    options
}

/// Print each enabled reporter, its effective options and whether it
/// resolves. Exits 1 when any name does not resolve.
fn check(options: &MultiReporterOptions) -> Result<()> {
    let resolved = config::resolve_options(&options.reporter_options)
        .context("Failed to resolve configuration")?;
    let names = config::enabled_reporters(&resolved);
    let registry = ReporterRegistry::new();

    let mut unresolved = 0;
    for name in &names {
        let reporter_options = config::reporter_options(&resolved, name);
        let rendered = serde_json::to_string(&Value::Object(reporter_options))
            .context("Failed to render reporter options")?;

        match registry.resolve(name) {
            Ok(_) => println!("{}: ok {}", name, rendered),
            Err(failure) => {
                unresolved += 1;
                println!(
                    "{}: unresolved ({}; {})",
                    name, failure.installed, failure.path
                );
            }
        }
    }

    if unresolved > 0 {
        process::exit(1);
    }
    Ok(())
}

/// Build the fan-out and push a small synthetic suite through the full
/// lifecycle, completion fan-in included.
fn preview(options: &MultiReporterOptions, fail: bool) -> Result<()> {
    let results = synthetic_results(fail);

    let handle = RunnerHandle::new(RunConfig {
        label: Some("preview".to_string()),
        total_tests: results.len(),
    });
    let multi = MultiReporter::new(&handle, options)
        .context("Failed to construct the reporter fan-out")?;
    info!("constructed {} reporters", multi.constructed());

    multi.report_start(handle.config());

    let mut suite = TestSuite::new();
    for result in results {
        multi.report_test_start(&result.name);
        multi.report_test_result(&result);
        suite.results.push(result);
    }
    suite.finalize();
    multi.report_suite_result(&suite);

    let failures = suite.failures as u32;
    let completed = Arc::new(AtomicBool::new(false));
    let completed_in_cb = Arc::clone(&completed);
    multi.done(failures, move |count| {
        info!("all reporters completed ({} failures)", count);
        completed_in_cb.store(true, Ordering::SeqCst);
    });

    if !completed.load(Ordering::SeqCst) {
        warn!("completion callback did not fire");
    }

    if failures > 0 {
        process::exit(1);
    }
    Ok(())
}

fn synthetic_results(fail: bool) -> Vec<TestResult> {
    let mut results = vec![
        TestResult::passed("parses empty input", Duration::from_millis(3)),
        TestResult::passed("round-trips a document", Duration::from_millis(12)),
        TestResult::skipped("needs network access"),
    ];
    if fail {
        results.push(TestResult::failed(
            "rejects malformed header",
            Duration::from_millis(7),
            "expected magic bytes",
        ));
    }
    results
}
