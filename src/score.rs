#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Converts a tally into one result record per submitter.

use std::fmt::Display;

use bon::Builder;
use tabled::Tabled;

use crate::{harness::Tally, identity::IdentifierSet};

/// A score in `[0, 100]`, rounded to two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Score(f64);

impl Score {
    /// Percentage of tests passed; exactly zero when nothing ran.
    pub fn from_tally(tally: &Tally) -> Self {
        if tally.total() == 0 {
            return Score(0.0);
        }
        let raw = (tally.passed() as f64 / tally.total() as f64) * 100.0;
        Score(round2(raw))
    }

    /// The numeric value.
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Rounds to two decimals, ties to even on the exact binary value.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

impl Display for Score {
    /// Prints the way a Python float prints: `100.0`, `75.0`, `33.33`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One row of the results log.
#[derive(Tabled, Debug, Clone, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct ResultRecord {
    /// Submitter this row is credited to.
    #[tabled(rename = "Student")]
    identifier: String,
    /// Tests run.
    #[tabled(rename = "Total")]
    total:      usize,
    /// Tests passed.
    #[tabled(rename = "Passed")]
    passed:     usize,
    /// Tests failed or errored.
    #[tabled(rename = "Failed")]
    failed:     usize,
    /// Percentage passed.
    #[tabled(rename = "Score")]
    score:      Score,
}

impl ResultRecord {
    /// Submitter this row is credited to.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Tests run.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Tests passed.
    pub fn passed(&self) -> usize {
        self.passed
    }

    /// Tests failed or errored.
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Percentage passed.
    pub fn score(&self) -> Score {
        self.score
    }

    /// Fields in results-log column order.
    pub fn fields(&self) -> [String; 5] {
        [
            self.identifier.clone(),
            self.total.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
            self.score.to_string(),
        ]
    }
}

/// One record per identifier, all carrying the same counts and score.
pub fn score(tally: &Tally, identifiers: &IdentifierSet) -> Vec<ResultRecord> {
    let score = Score::from_tally(tally);
    identifiers
        .iter()
        .map(|id| {
            ResultRecord::builder()
                .identifier(id)
                .total(tally.total())
                .passed(tally.passed())
                .failed(tally.failed())
                .score(score)
                .build()
        })
        .collect()
}
