#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Deployment-level settings: where rows go and what runs submitted code.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use bon::Builder;
use which::which;

use crate::constants::{
    DEFAULT_RESULTS_PATH, DEFAULT_RUNTIME, RESULTS_ENV, RUNTIME_ENV, TIMEOUT_ENV,
};

/// Interpreter command that hosts the execution worker, e.g. `sage -python`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommand {
    /// Program name or path.
    program: String,
    /// Arguments placed before the worker script.
    args:    Vec<String>,
}

impl RuntimeCommand {
    /// Parses a whitespace separated command line.
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("Runtime command is empty"))?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Program name as configured.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Leading arguments as configured.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Finds the program on `PATH`.
    pub fn resolve(&self) -> Result<OsString> {
        which(&self.program)
            .map(PathBuf::into_os_string)
            .with_context(|| format!("Cannot find the execution runtime on path ({})", self.program))
    }
}

impl Default for RuntimeCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_RUNTIME.to_string(),
            args:    Vec::new(),
        }
    }
}

/// Settings shared by every grading run.
#[derive(Debug, Clone, Builder)]
pub struct GraderConfig {
    /// CSV log that result rows are appended to.
    #[builder(into, default = PathBuf::from(DEFAULT_RESULTS_PATH))]
    results_path: PathBuf,
    /// Interpreter that runs the execution worker.
    #[builder(default)]
    runtime:      RuntimeCommand,
    /// Wall-clock limit for a single worker request, if any.
    exec_timeout: Option<Duration>,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GraderConfig {
    /// Reads `NBGRADE_RESULTS`, `NBGRADE_RUNTIME` and `NBGRADE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let results_path = non_empty(RESULTS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_PATH));
        let runtime = match non_empty(RUNTIME_ENV) {
            Some(command) => RuntimeCommand::parse(&command)?,
            None => RuntimeCommand::default(),
        };
        let exec_timeout = non_empty(TIMEOUT_ENV)
            .map(|secs| {
                secs.parse::<u64>()
                    .with_context(|| format!("{TIMEOUT_ENV} must be whole seconds, got `{secs}`"))
            })
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            results_path,
            runtime,
            exec_timeout,
        })
    }

    /// Location of the results log.
    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Directory holding the results log; the batch driver never grades
    /// anything inside it.
    pub fn results_dir(&self) -> &Path {
        self.results_path.parent().unwrap_or(Path::new(""))
    }

    /// Interpreter command for the execution worker.
    pub fn runtime(&self) -> &RuntimeCommand {
        &self.runtime
    }

    /// Per-request execution deadline.
    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout
    }

    /// Returns a new config writing to a different results log.
    pub fn with_results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = path.into();
        self
    }
}
