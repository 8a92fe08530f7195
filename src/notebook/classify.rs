use super::{Cell, Submission};
use crate::constants::TESTS_TAG;

/// A submission's code cells, partitioned by role.
#[derive(Debug, Clone, Default)]
pub struct Classification<'a> {
    /// The cell at index 0, when it is a code cell.
    identifier_cell:      Option<&'a Cell>,
    /// Untagged code cells, in document order.
    implementation_cells: Vec<&'a Cell>,
    /// Code cells tagged `tests`, in document order.
    test_cells:           Vec<&'a Cell>,
}

impl<'a> Classification<'a> {
    /// The cell naming the submitter, if any.
    pub fn identifier_cell(&self) -> Option<&'a Cell> {
        self.identifier_cell
    }

    /// Source of the identifier cell, or the empty string.
    pub fn identifier_source(&self) -> &'a str {
        self.identifier_cell.map(Cell::source).unwrap_or_default()
    }

    /// Implementation cells in document order.
    pub fn implementation_cells(&self) -> &[&'a Cell] {
        &self.implementation_cells
    }

    /// Test cells in document order.
    pub fn test_cells(&self) -> &[&'a Cell] {
        &self.test_cells
    }
}

/// Splits a submission into identifier, implementation and test cells.
///
/// Only the cell at position 0 can be the identifier cell; a leading
/// markdown cell means there is none. Non-code cells are dropped.
pub fn classify(submission: &Submission) -> Classification<'_> {
    let mut classification = Classification::default();

    for cell in submission.cells().iter().filter(|c| c.is_code()) {
        if cell.index() == 0 {
            classification.identifier_cell = Some(cell);
        } else if cell.has_tag(TESTS_TAG) {
            classification.test_cells.push(cell);
        } else {
            classification.implementation_cells.push(cell);
        }
    }

    tracing::debug!(
        "Classified {} implementation and {} test cells (identifier cell: {})",
        classification.implementation_cells.len(),
        classification.test_cells.len(),
        classification.identifier_cell.is_some()
    );
    classification
}
