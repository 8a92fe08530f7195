#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Tree-sitter parser wrapper for Python source code.

use std::fmt::Formatter;

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Node, Tree};

/// A struct that wraps a tree-sitter parse tree and the source it came from.
#[derive(Clone)]
pub struct Parser {
    /// The source code being parsed.
    code: String,
    /// The parse tree.
    tree: Tree,
}

/// Statements the grammar accepts that only Python 2 compiles.
const PYTHON2_ONLY: &[&str] = &["print_statement", "exec_statement"];

/// Returns the compiled tree-sitter Python language.
fn python_language() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("bytes", &self.code.len())
            .field("has_errors", &self.has_errors())
            .finish()
    }
}

impl Parser {
    /// Parses `source_code`. Nothing is evaluated.
    ///
    /// * `source_code`: the source code to be parsed
    pub fn new(source_code: impl Into<String>) -> Result<Self> {
        let code = source_code.into();
        let mut parser = tree_sitter::Parser::new();

        parser
            .set_language(&python_language())
            .with_context(|| "Failed to load Python grammar")?;
        let tree = parser
            .parse(code.as_str(), None)
            .ok_or_else(|| anyhow!("Error parsing Python code"))?;

        Ok(Self { code, tree })
    }

    /// Returns the parse tree's root node.
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Whether the tree contains syntax errors, missing tokens or Python 2
    /// statements, i.e. whether Python 3 would refuse to compile the source.
    pub fn has_errors(&self) -> bool {
        let root = self.tree.root_node();
        root.has_error() || contains_kind(root, PYTHON2_ONLY)
    }

    /// Source text spanned by `node`.
    pub fn text(&self, node: Node<'_>) -> Result<&str> {
        node.utf8_text(self.code.as_bytes())
            .context("Cannot map syntax node to source text")
    }
}

/// Whether `node` or any named descendant has one of `kinds`.
fn contains_kind(node: Node<'_>, kinds: &[&str]) -> bool {
    if kinds.contains(&node.kind()) {
        return true;
    }
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .any(|child| contains_kind(child, kinds));
    found
}
