#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Runs instructor tests against a copy of the implementation namespace.

use itertools::Itertools;
use tabled::Tabled;
use thiserror::Error;

use crate::{
    constants::{TEST_MODULE, TEST_SOURCE_SEPARATOR, TESTS_ORIGIN},
    notebook::Cell,
    runtime::{Namespace, Runtime, RuntimeError, TestOutcome},
};

/// Counts of tests run, passed and failed for one submission.
///
/// `failed` merges assertion failures and errors; `passed + failed == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Tests run.
    total:  usize,
    /// Tests that passed.
    passed: usize,
    /// Tests that failed or errored.
    failed: usize,
}

impl Tally {
    /// Builds a tally from pass and fail counts.
    pub fn new(passed: usize, failed: usize) -> Self {
        Self {
            total: passed + failed,
            passed,
            failed,
        }
    }

    /// Counts one outcome.
    pub fn record(&mut self, outcome: TestOutcome) {
        self.total += 1;
        if outcome.is_pass() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Tests run.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Tests that passed.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Tests that failed or errored.
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl FromIterator<TestOutcome> for Tally {
    fn from_iter<T: IntoIterator<Item = TestOutcome>>(iter: T) -> Self {
        let mut tally = Tally::default();
        iter.into_iter().for_each(|o| tally.record(o));
        tally
    }
}

/// What happened to a single discovered test.
#[derive(Tabled, Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    /// Name the test unit is bound to.
    #[tabled(rename = "Unit")]
    pub unit:    String,
    /// Test operation name.
    #[tabled(rename = "Test")]
    pub method:  String,
    /// Pass, failure or error.
    #[tabled(rename = "Outcome")]
    pub outcome: TestOutcome,
    /// Traceback or message for failures and errors.
    #[tabled(skip)]
    pub detail:  Option<String>,
}

/// Everything the harness learned about a submission's tests.
#[derive(Debug, Clone, Default)]
pub struct HarnessReport {
    /// Aggregate counts.
    pub tally:   Tally,
    /// Per-test outcomes in run order.
    pub reports: Vec<TestReport>,
}

impl HarnessReport {
    /// Reports for tests that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &TestReport> {
        self.reports.iter().filter(|r| !r.outcome.is_pass())
    }
}

/// Running the tests could not complete.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The implementation namespace could not be copied.
    #[error("Could not prepare the test namespace")]
    Fork(#[source] RuntimeError),

    /// The joined test source itself failed to execute.
    #[error("Test cells failed to execute")]
    TestSource(#[source] RuntimeError),

    /// The runtime broke down while running a test unit.
    #[error("Execution runtime failed while running {unit}")]
    Runtime {
        /// Test unit being run.
        unit:   String,
        /// What the runtime reported.
        #[source]
        source: RuntimeError,
    },
}

/// Joins test cell sources, in document order, into one program.
pub fn join_test_sources(cells: &[&Cell]) -> String {
    cells.iter().map(|c| c.source()).join(TEST_SOURCE_SEPARATOR)
}

/// Forks `implementation`, runs the test cells in the fork, then discovers
/// and runs every test method found there.
///
/// `implementation` is only read; the fork is released before returning.
pub async fn run_tests<R: Runtime>(
    runtime: &mut R,
    implementation: &Namespace<R::Value>,
    test_cells: &[&Cell],
) -> Result<HarnessReport, HarnessError> {
    let mut namespace = runtime
        .fork(implementation, TEST_MODULE)
        .await
        .map_err(HarnessError::Fork)?;

    let report = run_in(runtime, &mut namespace, &join_test_sources(test_cells)).await;

    if let Err(err) = runtime.release(namespace).await {
        tracing::debug!("Could not release test namespace: {err}");
    }
    report
}

/// Executes the test program in `namespace` and runs what it declares.
async fn run_in<R: Runtime>(
    runtime: &mut R,
    namespace: &mut Namespace<R::Value>,
    program: &str,
) -> Result<HarnessReport, HarnessError> {
    runtime
        .execute(namespace, program, TESTS_ORIGIN)
        .await
        .map_err(HarnessError::TestSource)?;

    let units: Vec<(String, Vec<String>)> = namespace
        .test_units()
        .map(|(unit, methods)| (unit.to_string(), methods.to_vec()))
        .collect();
    tracing::info!(
        "Discovered {} tests in {} units",
        units.iter().map(|(_, methods)| methods.len()).sum::<usize>(),
        units.len()
    );

    let mut report = HarnessReport::default();
    for (unit, methods) in units {
        let runs = match runtime.run_unit(namespace, &unit, &methods).await {
            Ok(runs) => runs,
            Err(source) => return Err(HarnessError::Runtime { unit, source }),
        };

        for (method, run) in methods.into_iter().zip(runs) {
            if run.outcome.is_pass() {
                tracing::debug!("{unit}.{method}: {}", run.outcome);
            } else {
                tracing::warn!("{unit}.{method}: {}", run.outcome);
            }

            report.tally.record(run.outcome);
            report.reports.push(TestReport {
                unit: unit.clone(),
                method,
                outcome: run.outcome,
                detail: run.detail,
            });
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::CellKind;

    #[test]
    fn tally_keeps_passed_plus_failed_equal_to_total() {
        let tally: Tally = [
            TestOutcome::Pass,
            TestOutcome::Failure,
            TestOutcome::Error,
            TestOutcome::Pass,
        ]
        .into_iter()
        .collect();

        assert_eq!(tally, Tally::new(2, 2));
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.passed() + tally.failed(), tally.total());
    }

    #[test]
    fn empty_tally_is_zero() {
        let tally: Tally = std::iter::empty::<TestOutcome>().collect();
        assert_eq!((tally.total(), tally.passed(), tally.failed()), (0, 0, 0));
    }

    #[test]
    fn test_sources_join_with_blank_line() {
        let a = Cell::new(3, CellKind::Code, "import unittest", ["tests"]);
        let b = Cell::new(5, CellKind::Code, "class T(unittest.TestCase): pass", ["tests"]);
        assert_eq!(
            join_test_sources(&[&a, &b]),
            "import unittest\n\nclass T(unittest.TestCase): pass"
        );
        assert_eq!(join_test_sources(&[]), "");
    }
}
