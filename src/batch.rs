#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Grades every notebook under a directory, one at a time.

use std::{
    fmt::Display,
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result};
use colored::Colorize;
use glob::{Pattern, glob};

use crate::{
    config::GraderConfig,
    grade::{Graded, grade_and_record},
};

/// A notebook that could not be graded.
#[derive(Debug)]
pub struct BatchFailure {
    /// The notebook.
    pub path:  PathBuf,
    /// Why grading stopped.
    pub error: anyhow::Error,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Notebooks graded and recorded, in discovery order.
    pub graded: Vec<(PathBuf, Graded)>,
    /// Notebooks that produced no row.
    pub failed: Vec<BatchFailure>,
}

impl BatchSummary {
    /// Whether every discovered notebook was graded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of notebooks looked at.
    pub fn len(&self) -> usize {
        self.graded.len() + self.failed.len()
    }

    /// Whether no notebooks were found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (_, graded) in &self.graded {
            writeln!(f, "{} {}", "ok".green().bold(), graded.summary_line())?;
        }
        for failure in &self.failed {
            writeln!(
                f,
                "{} {}: {:#}",
                "failed".red().bold(),
                failure.path.display(),
                failure.error
            )?;
        }
        write!(
            f,
            "Graded {} of {} notebooks",
            self.graded.len(),
            self.len()
        )
    }
}

/// Whether any component of `path` below `root` is hidden, e.g.
/// `.ipynb_checkpoints`.
fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')))
}

/// Every `*.ipynb` under `root`, sorted, leaving out hidden paths and
/// anything inside `results_dir`.
pub fn discover_submissions(root: &Path, results_dir: &Path) -> Result<Vec<PathBuf>> {
    let root_str = root
        .to_str()
        .context("Could not convert submissions directory to string")?;
    let pattern = format!("{}/**/*.ipynb", Pattern::escape(root_str));

    let results_dir = if results_dir.as_os_str().is_empty() {
        None
    } else {
        fs::canonicalize(results_dir).ok()
    };

    let mut paths: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && !is_hidden(p, root))
        .filter(|p| match (&results_dir, fs::canonicalize(p)) {
            (Some(dir), Ok(full)) => !full.starts_with(dir),
            _ => true,
        })
        .collect();
    paths.sort();

    tracing::info!("Found {} notebooks under {}", paths.len(), root.display());
    Ok(paths)
}

/// Grades each notebook under `root` independently. A notebook that fails
/// is recorded in the summary and the batch moves on.
pub async fn grade_all(root: &Path, config: &GraderConfig) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for path in discover_submissions(root, config.results_dir())? {
        match grade_and_record(&path, config).await {
            Ok(graded) => summary.graded.push((path, graded)),
            Err(error) => {
                tracing::warn!("{:#}", error);
                summary.failed.push(BatchFailure { path, error });
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nbgrade-batch-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "{}").expect("write");
    }

    #[test]
    fn finds_notebooks_recursively_in_order() {
        let root = scratch();
        touch(&root.join("b/hw1.ipynb"));
        touch(&root.join("a.ipynb"));
        touch(&root.join("b/notes.txt"));

        let found = discover_submissions(&root, Path::new("")).expect("discover");
        assert_eq!(found, vec![root.join("a.ipynb"), root.join("b/hw1.ipynb")]);
    }

    #[test]
    fn skips_checkpoints_and_results() {
        let root = scratch();
        touch(&root.join("alice.ipynb"));
        touch(&root.join(".ipynb_checkpoints/alice-checkpoint.ipynb"));
        touch(&root.join("results/stray.ipynb"));

        let found = discover_submissions(&root, &root.join("results")).expect("discover");
        assert_eq!(found, vec![root.join("alice.ipynb")]);
    }

    #[test]
    fn hidden_root_itself_is_allowed() {
        let root = scratch().join(".submissions");
        touch(&root.join("bob.ipynb"));

        let found = discover_submissions(&root, Path::new("")).expect("discover");
        assert_eq!(found, vec![root.join("bob.ipynb")]);
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let root = scratch();
        assert!(discover_submissions(&root, Path::new("")).expect("discover").is_empty());
        assert!(BatchSummary::default().is_success());
    }
}
