#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The append-only CSV log shared by every grading run.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{constants::RESULTS_HEADER, score::ResultRecord};

/// A CSV file that rows are only ever appended to.
#[derive(Debug, Clone)]
pub struct ResultsLog {
    /// Location of the file.
    path: PathBuf,
}

impl ResultsLog {
    /// A log at `path`. Nothing is touched until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row per record, writing the header first if this call
    /// creates the file.
    pub fn append(&self, records: &[ResultRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }

        let (mut file, created) = match OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => (file, true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .with_context(|| format!("Could not open {}", self.path.display()))?;
                (file, false)
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Could not create {}", self.path.display()));
            }
        };

        let rows = encode(created, records)?;

        // One write per submission keeps concurrent graders from interleaving rows.
        file.write_all(&rows)
            .with_context(|| format!("Could not append to {}", self.path.display()))?;
        tracing::info!("Appended {} rows to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Encodes `records` as CSV lines ending in `\r\n`, preceded by the header
/// when `header` is set.
fn encode(header: bool, records: &[ResultRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    if header {
        writer.write_record(RESULTS_HEADER)?;
    }
    for record in records {
        writer.write_record(record.fields())?;
    }

    writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("Could not encode result rows")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{harness::Tally, identity::IdentifierSet, score::score};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("nbgrade-results-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).expect("read log")
    }

    #[test]
    fn first_append_writes_header_once() {
        let path = scratch("grades.csv");
        let log = ResultsLog::new(&path);

        log.append(&score(&Tally::new(3, 1), &IdentifierSet::single("abc123")))
            .expect("append");
        log.append(&score(&Tally::new(1, 2), &IdentifierSet::single("xyz789")))
            .expect("append");

        let text = read(&path);
        assert_eq!(text.matches("\r\n").count(), 3);
        insta::assert_snapshot!(text.replace("\r\n", "\n"), @r"
        student_id,total,passed,failed,score
        abc123,4,3,1,75.0
        xyz789,3,1,2,33.33
        ");
    }

    #[test]
    fn group_rows_are_written_together() {
        let path = scratch("grades.csv");
        let ids = IdentifierSet::from_values(["a".to_string(), "b".to_string()]);

        ResultsLog::new(&path)
            .append(&score(&Tally::new(0, 0), &ids))
            .expect("append");

        insta::assert_snapshot!(read(&path).replace("\r\n", "\n"), @r"
        student_id,total,passed,failed,score
        a,0,0,0,0.0
        b,0,0,0,0.0
        ");
    }

    #[test]
    fn existing_file_gets_no_second_header() {
        let path = scratch("grades.csv");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "student_id,total,passed,failed,score\r\nold,1,1,0,100.0\r\n")
            .expect("seed");

        ResultsLog::new(&path)
            .append(&score(&Tally::new(1, 0), &IdentifierSet::single("old")))
            .expect("append");

        let text = read(&path);
        assert_eq!(text.matches("student_id").count(), 1);
        assert!(text.ends_with("old,1,1,0,100.0\r\nold,1,1,0,100.0\r\n"));
    }

    #[test]
    fn identifiers_are_quoted_only_when_needed() {
        let records = score(
            &Tally::new(1, 0),
            &IdentifierSet::from_values(["doe, jane".to_string(), "plain".to_string()]),
        );
        let rows = String::from_utf8(encode(false, &records).expect("encode")).expect("utf-8");
        assert_eq!(rows, "\"doe, jane\",1,1,0,100.0\r\nplain,1,1,0,100.0\r\n");
    }
}
