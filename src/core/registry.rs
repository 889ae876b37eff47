use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::ReporterOptions;
use crate::core::error::Result;
use crate::core::runner::RunnerHandle;
use crate::reporters::csv::CsvReporter;
use crate::reporters::json::JsonReporter;
use crate::reporters::text::TextReporter;
use crate::reporters::Reporter;

/// Constructs a reporter from the runner handle and its resolved options.
/// A factory error aborts the whole fan-out's construction.
pub type Factory = Box<
    dyn Fn(&RunnerHandle, &ReporterOptions) -> Result<Box<dyn Reporter + Send + Sync>>
        + Send
        + Sync,
>;

/// A single lookup tier's miss, shown in diagnostics and never propagated.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no installed reporter named \"{name}\"")]
    NotInstalled { name: String },

    #[error("no reporter module at {}", path.display())]
    NotFound { path: PathBuf },
}

/// All three lookup tiers missed; carries both external-tier errors so the
/// loader can log the full picture.
#[derive(Debug)]
pub struct ResolveFailure {
    pub installed: ResolveError,
    pub path: ResolveError,
}

/// Three-tier reporter lookup: built-ins by exact name, then installed
/// factories by name, then factories keyed by filesystem path (names are
/// qualified against the current working directory). First hit wins; a
/// built-in hit never consults the external tiers.
pub struct ReporterRegistry {
    builtin: HashMap<String, Factory>,
    installed: HashMap<String, Factory>,
    paths: HashMap<PathBuf, Factory>,
}

impl ReporterRegistry {
    /// A registry holding the crate's built-in reporters: `text`, `json`
    /// and `csv`.
    pub fn new() -> Self {
        let mut builtin: HashMap<String, Factory> = HashMap::new();
        builtin.insert(
            "text".to_string(),
            Box::new(|runner, options| {
                Ok(Box::new(TextReporter::from_options(runner, options))
                    as Box<dyn Reporter + Send + Sync>)
            }),
        );
        builtin.insert(
            "json".to_string(),
            Box::new(|runner, options| {
                Ok(Box::new(JsonReporter::from_options(runner, options))
                    as Box<dyn Reporter + Send + Sync>)
            }),
        );
        builtin.insert(
            "csv".to_string(),
            Box::new(|runner, options| {
                Ok(Box::new(CsvReporter::from_options(runner, options))
                    as Box<dyn Reporter + Send + Sync>)
            }),
        );
        Self {
            builtin,
            installed: HashMap::new(),
            paths: HashMap::new(),
        }
    }

    /// Register an external reporter under a name, the analogue of an
    /// installed package.
    pub fn install(&mut self, name: &str, factory: Factory) {
        self.installed.insert(name.to_string(), factory);
    }

    /// Register an external reporter under a filesystem path. Relative
    /// paths are qualified against the current working directory, matching
    /// how lookup qualifies names.
    pub fn install_path(&mut self, path: &Path, factory: Factory) {
        self.paths.insert(qualify(path), factory);
    }

    /// Resolve a name through the tiers in order, short-circuiting on the
    /// first hit. A total miss returns both external-tier errors.
    pub fn resolve(&self, name: &str) -> std::result::Result<&Factory, ResolveFailure> {
        if let Some(factory) = self.builtin.get(name) {
            return Ok(factory);
        }
        if let Some(factory) = self.installed.get(name) {
            return Ok(factory);
        }
        let path = qualify(Path::new(name));
        if let Some(factory) = self.paths.get(&path) {
            return Ok(factory);
        }
        Err(ResolveFailure {
            installed: ResolveError::NotInstalled {
                name: name.to_string(),
            },
            path: ResolveError::NotFound { path },
        })
    }
}

impl Default for ReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn qualify(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
