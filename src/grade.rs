#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Grades one notebook end to end: load, classify, identify, execute, test,
//! score and record.

use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::{
    config::GraderConfig,
    harness::{HarnessError, HarnessReport, run_tests},
    identity::{IdentifierSet, extract_identifiers},
    notebook::{self, FormatError, classify},
    python::PythonRuntime,
    results::ResultsLog,
    runtime::{Runtime, RuntimeError},
    sandbox::{SandboxError, build_namespace},
    score::{ResultRecord, score},
};

/// A submission could not be graded. No row is recorded for it.
#[derive(Error, Debug)]
pub enum GradeError {
    /// The document is not a readable v4 notebook.
    #[error("Could not load notebook")]
    Format(#[from] FormatError),

    /// An implementation cell raised or ran past the deadline.
    #[error("Implementation cell {cell} crashed")]
    Implementation {
        /// Document index of the cell.
        cell:   usize,
        /// What the runtime reported.
        #[source]
        source: RuntimeError,
    },

    /// The joined test cells raised while being executed.
    #[error("Test cells could not be executed")]
    TestExecution(#[source] RuntimeError),

    /// The execution runtime itself broke down.
    #[error("Execution runtime failed")]
    Runtime(#[source] RuntimeError),
}

/// Whether the error was caused by the code being run rather than by the
/// runtime running it.
fn caused_by_code(err: &RuntimeError) -> bool {
    matches!(err, RuntimeError::Raised { .. } | RuntimeError::Timeout(_))
}

impl From<SandboxError> for GradeError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::Cell { cell, source } if caused_by_code(&source) => {
                GradeError::Implementation { cell, source }
            }
            SandboxError::Cell { source, .. } | SandboxError::Create(source) => {
                GradeError::Runtime(source)
            }
        }
    }
}

impl From<HarnessError> for GradeError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::TestSource(source) if caused_by_code(&source) => {
                GradeError::TestExecution(source)
            }
            HarnessError::TestSource(source)
            | HarnessError::Fork(source)
            | HarnessError::Runtime { source, .. } => GradeError::Runtime(source),
        }
    }
}

/// Everything learned from grading one submission.
#[derive(Debug, Clone)]
pub struct Graded {
    /// Who the submission is credited to.
    pub identifiers: IdentifierSet,
    /// Per-test outcomes and the tally.
    pub report:      HarnessReport,
    /// One record per identifier.
    pub records:     Vec<ResultRecord>,
}

impl Graded {
    /// `ids: passed/total passed (score%)`, with a bare `0` score when no
    /// tests ran.
    pub fn summary_line(&self) -> String {
        let tally = self.report.tally;
        let score = match self.records.first() {
            Some(record) if tally.total() > 0 => record.score().to_string(),
            _ => "0".to_string(),
        };
        format!(
            "{}: {}/{} passed ({}%)",
            self.identifiers,
            tally.passed(),
            tally.total(),
            score
        )
    }
}

/// Grades the notebook at `path` using `runtime` for all execution.
///
/// The runtime should be fresh: nothing from an earlier submission may be
/// visible to this one.
pub async fn grade_submission<R: Runtime>(
    path: &Path,
    runtime: &mut R,
) -> Result<Graded, GradeError> {
    let submission = notebook::load(path)?;
    tracing::info!("Loaded {} cells from {}", submission.len(), path.display());

    let cells = classify(&submission);
    tracing::info!(
        "Found {} implementation cells and {} test cells",
        cells.implementation_cells().len(),
        cells.test_cells().len()
    );

    let identifiers = extract_identifiers(cells.identifier_source());
    let implementation = build_namespace(runtime, cells.implementation_cells()).await?;

    let report = run_tests(runtime, &implementation, cells.test_cells()).await;
    if let Err(err) = runtime.release(implementation).await {
        tracing::debug!("Could not release implementation namespace: {err}");
    }
    let report = report?;

    tracing::info!(
        "Ran {} tests: {} passed, {} failed",
        report.tally.total(),
        report.tally.passed(),
        report.tally.failed()
    );

    let records = score(&report.tally, &identifiers);
    Ok(Graded {
        identifiers,
        report,
        records,
    })
}

/// Grades `path` in a fresh Python worker and appends the resulting rows to
/// the configured results log.
///
/// Nothing is appended unless grading succeeds.
pub async fn grade_and_record(path: &Path, config: &GraderConfig) -> Result<Graded> {
    let mut runtime = PythonRuntime::from_config(config)?;
    let graded = grade_submission(path, &mut runtime).await;
    if let Err(err) = runtime.shutdown().await {
        tracing::debug!("Execution worker did not shut down cleanly: {err:#}");
    }

    let graded = graded.with_context(|| format!("Failed to grade {}", path.display()))?;
    ResultsLog::new(config.results_path()).append(&graded.records)?;
    Ok(graded)
}
