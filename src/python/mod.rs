#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Everything that knows about Python: reading source without running it,
//! and running it out of process.

/// Rendering of Python literal expressions
pub mod literal;
/// Tree-sitter parser wrapper for Python source
pub mod parser;
/// The worker-backed execution runtime
pub mod runtime;

pub use runtime::{PyValue, PythonRuntime};
