#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # nbgrade
//!
//! Grades Jupyter notebook submissions against the instructor tests embedded
//! in them and appends one CSV row per student to a shared results log.
//!
//! ```text
//! nbgrade grade submissions/alice.ipynb
//! nbgrade grade-all submissions --results out/grades.csv
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use bpaf::*;
use dotenvy::dotenv;
use nbgrade::{batch::grade_all, config::GraderConfig, grade::grade_and_record};
use tabled::{Table, settings::Style};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Flags accepted by every subcommand.
#[derive(Debug, Clone)]
struct Shared {
    /// Results log overriding the configured one.
    results: Option<PathBuf>,
    /// Log at debug level.
    verbose: bool,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a single notebook
    Grade(Shared, PathBuf),
    /// Grade every notebook under a directory
    GradeAll(Shared, PathBuf),
}

impl Cmd {
    /// Flags common to all commands.
    fn shared(&self) -> &Shared {
        match self {
            Cmd::Grade(shared, _) | Cmd::GradeAll(shared, _) => shared,
        }
    }
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the shared flags
    fn s() -> impl Parser<Shared> {
        let results = long("results")
            .help("CSV file to append results to")
            .argument::<PathBuf>("PATH")
            .optional();
        let verbose = short('v')
            .long("verbose")
            .help("Show debug output, including the worker's stderr")
            .switch();
        construct!(Shared { results, verbose })
    }

    /// parses a notebook path
    fn n() -> impl Parser<PathBuf> {
        positional::<PathBuf>("NOTEBOOK").help("Path to a student notebook")
    }

    /// parses a directory path
    fn d() -> impl Parser<PathBuf> {
        positional::<PathBuf>("DIR").help("Directory searched recursively for notebooks")
    }

    let grade = construct!(Cmd::Grade(s(), n()))
        .to_options()
        .command("grade")
        .help("Grade one notebook and record the result");

    let grade_all = construct!(Cmd::GradeAll(s(), d()))
        .to_options()
        .command("grade-all")
        .help("Grade every notebook under a directory");

    let cmd = construct!([grade, grade_all]);

    cmd.to_options()
        .descr("Autograder for Jupyter notebook assignments")
        .run()
}

/// Grades one notebook and prints its records.
async fn grade_one(path: &Path, config: &GraderConfig) -> Result<()> {
    let graded = grade_and_record(path, config).await?;

    println!("{}", Table::new(&graded.records).with(Style::modern()));
    if graded.report.failures().next().is_some() {
        println!(
            "{}",
            Table::new(graded.report.failures()).with(Style::modern())
        );
    }
    println!("{}", graded.summary_line());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cmd = options();
    let shared = cmd.shared().clone();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(if shared.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    });
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let mut config = GraderConfig::from_env().context("Invalid configuration")?;
    if let Some(results) = shared.results {
        config = config.with_results_path(results);
    }

    match cmd {
        Cmd::Grade(_, notebook) => grade_one(&notebook, &config).await?,
        Cmd::GradeAll(_, dir) => {
            let summary = grade_all(&dir, &config).await?;
            println!("{summary}");
            ensure!(
                summary.is_success(),
                "{} of {} notebooks could not be graded",
                summary.failed.len(),
                summary.len()
            );
        }
    };

    Ok(())
}
