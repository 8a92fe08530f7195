#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Notebook documents: cells as loaded from disk, and their classification.

use std::{collections::BTreeSet, fmt::Display};


/// Partitioning cells into identifier, implementation and test cells.
mod classify;
/// Parsing nbformat JSON into a [`Submission`].
mod loader;

pub use classify::{Classification, classify};
pub use loader::{FormatError, load, parse};

/// Discriminates code cells from everything else (markdown, raw).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// A code cell.
    Code,
    /// Any other cell type.
    Other,
}

impl Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Code => write!(f, "code"),
            CellKind::Other => write!(f, "other"),
        }
    }
}

/// One cell of a notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Position in the document, starting at 0.
    index:  usize,
    /// Code or not.
    kind:   CellKind,
    /// Cell source with multi-line sources already joined.
    source: String,
    /// Lowercased metadata tags.
    tags:   BTreeSet<String>,
}

impl Cell {
    /// Creates a cell; tags are lowercased.
    pub fn new(
        index: usize,
        kind: CellKind,
        source: impl Into<String>,
        tags: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            index,
            kind,
            source: source.into(),
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Position in the document.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this is a code cell.
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Returns true for code cells.
    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    /// Cell source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lowercased tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Exact, case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag.to_lowercase())
    }
}

/// The ordered cells of one submitted notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    /// Cells in document order.
    cells: Vec<Cell>,
}

impl Submission {
    /// Wraps cells that are already in document order.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Cells in document order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of cells, code or not.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the document has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
