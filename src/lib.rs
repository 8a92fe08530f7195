//! # nbgrade
//!
//! An autograder for programming exercises delivered as Jupyter notebooks.
//! Instructor tests live in code cells tagged `tests`; everything else after
//! the first cell is the student's implementation. The first cell names the
//! submitter and is parsed, never executed.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Batch grading over a directory of submissions
pub mod batch;
/// Configuration sourced from the environment
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// The grading pipeline for a single submission
pub mod grade;
/// Test discovery and execution against an implementation namespace
pub mod harness;
/// Static recovery of submitter identifiers
pub mod identity;
/// Notebook loading and cell classification
pub mod notebook;
/// Long-lived child processes spoken to over stdin/stdout
pub mod process;
/// Python parsing and the Python execution runtime
pub mod python;
/// The append-only CSV results log
pub mod results;
/// The execution runtime contract
pub mod runtime;
/// Building the implementation namespace
pub mod sandbox;
/// Turning tallies into result records
pub mod score;

pub use grade::{GradeError, Graded, grade_and_record, grade_submission};
pub use harness::Tally;
pub use identity::IdentifierSet;
pub use score::ResultRecord;
