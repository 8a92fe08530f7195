use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::{Cell, CellKind, Submission};
use crate::constants::NBFORMAT_MAJOR;

/// The document is not a notebook this grader understands.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The file could not be read.
    #[error("Could not read notebook {}", path.display())]
    Io {
        /// Path that was being read.
        path:   PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The contents are not the expected cell-array JSON schema.
    #[error("Notebook does not match the expected schema: {0}")]
    Json(#[from] serde_json::Error),

    /// A notebook schema major version other than 4.
    #[error("Unsupported notebook format version {0} (expected {NBFORMAT_MAJOR})")]
    UnsupportedVersion(u64),
}

/// Cell source as stored on disk: either one string or a list of lines.
#[derive(Deserialize, Default)]
#[serde(untagged)]
enum MultilineText {
    /// Lines, each carrying its own trailing newline.
    Lines(Vec<String>),
    /// A single string.
    Text(String),
    /// Missing source.
    #[default]
    Absent,
}

impl From<MultilineText> for String {
    fn from(text: MultilineText) -> Self {
        match text {
            MultilineText::Lines(lines) => lines.concat(),
            MultilineText::Text(text) => text,
            MultilineText::Absent => String::new(),
        }
    }
}

/// Cell metadata; only tags matter here.
#[derive(Deserialize, Default)]
struct RawMetadata {
    /// Free-form labels attached to the cell.
    #[serde(default)]
    tags: Vec<String>,
}

/// One cell as it appears in nbformat v4 JSON.
#[derive(Deserialize)]
struct RawCell {
    /// `code`, `markdown` or `raw`.
    cell_type: String,
    /// Cell source.
    #[serde(default)]
    source:    MultilineText,
    /// Cell metadata.
    #[serde(default)]
    metadata:  RawMetadata,
}

/// Top-level notebook document.
#[derive(Deserialize)]
struct RawNotebook {
    /// Schema major version.
    nbformat: u64,
    /// Cells in document order.
    cells:    Vec<RawCell>,
}

/// Parses notebook JSON into a submission. Nothing is executed.
pub fn parse(text: &str) -> Result<Submission, FormatError> {
    let raw: RawNotebook = serde_json::from_str(text)?;
    if raw.nbformat != NBFORMAT_MAJOR {
        return Err(FormatError::UnsupportedVersion(raw.nbformat));
    }

    let cells = raw
        .cells
        .into_iter()
        .enumerate()
        .map(|(index, cell)| {
            let kind = if cell.cell_type == "code" {
                CellKind::Code
            } else {
                CellKind::Other
            };
            Cell::new(index, kind, cell.source, cell.metadata.tags)
        })
        .collect();

    Ok(Submission::new(cells))
}

/// Reads and parses the notebook at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Submission, FormatError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| FormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let submission = parse(&text)?;
    tracing::debug!("Loaded {} cells from {}", submission.len(), path.display());
    Ok(submission)
}
