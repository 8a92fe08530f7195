#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Identifier recorded when the first cell names nobody.
pub const SENTINEL_ID: &str = "UNKNOWN";

/// Cell tag (compared lowercase) marking instructor test cells.
pub const TESTS_TAG: &str = "tests";

/// Assignment target naming a single submitter.
pub const STUDENT_ID_TARGET: &str = "STUDENT_ID";

/// Assignment target naming a group of submitters.
pub const STUDENT_IDS_TARGET: &str = "STUDENT_IDS";

/// Module name the implementation namespace is seeded with.
pub const IMPLEMENTATION_MODULE: &str = "student";

/// Module name the test namespace is seeded with.
pub const TEST_MODULE: &str = "student_tests";

/// Origin label for implementation cells in tracebacks.
pub const CELL_ORIGIN: &str = "<cell>";

/// Origin label for the joined test source in tracebacks.
pub const TESTS_ORIGIN: &str = "<tests>";

/// Separator placed between test cell sources before execution.
pub const TEST_SOURCE_SEPARATOR: &str = "\n\n";

/// Header row of the results log.
pub const RESULTS_HEADER: [&str; 5] = ["student_id", "total", "passed", "failed", "score"];

/// Only notebook schema major version accepted by the loader.
pub const NBFORMAT_MAJOR: u64 = 4;

/// Default location of the results log, relative to the working directory.
pub const DEFAULT_RESULTS_PATH: &str = "results/grades.csv";

/// Default interpreter command for the execution runtime.
pub const DEFAULT_RUNTIME: &str = "python3";

/// Environment variable overriding the results log location.
pub const RESULTS_ENV: &str = "NBGRADE_RESULTS";

/// Environment variable overriding the interpreter command.
pub const RUNTIME_ENV: &str = "NBGRADE_RUNTIME";

/// Environment variable setting a per-request execution deadline, in seconds.
pub const TIMEOUT_ENV: &str = "NBGRADE_TIMEOUT_SECS";
