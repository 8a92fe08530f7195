#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Recovers submitter identifiers from the first cell by reading its syntax
//! tree. The cell is never executed.

use std::fmt::Display;

use anyhow::{Result, bail};
use itertools::Itertools;
use tree_sitter::Node;

use crate::{
    constants::{SENTINEL_ID, STUDENT_ID_TARGET, STUDENT_IDS_TARGET},
    python::{
        literal::{constant, sequence_items},
        parser::Parser,
    },
};

/// The submitters a result is credited to. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSet {
    /// Identifiers in the order they were declared.
    ids: Vec<String>,
}

impl IdentifierSet {
    /// The one-element set used when nobody could be identified.
    pub fn sentinel() -> Self {
        Self::single(SENTINEL_ID)
    }

    /// A single submitter.
    pub fn single(id: impl Into<String>) -> Self {
        Self {
            ids: vec![id.into()],
        }
    }

    /// A group of submitters; falls back to the sentinel when empty.
    pub fn from_values(ids: impl IntoIterator<Item = String>) -> Self {
        let ids: Vec<String> = ids.into_iter().collect();
        if ids.is_empty() {
            Self::sentinel()
        } else {
            Self { ids }
        }
    }

    /// Identifiers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Number of identifiers, at least one.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether more than one submitter is named.
    pub fn is_group(&self) -> bool {
        self.ids.len() > 1
    }

    /// Whether this is exactly the sentinel set.
    pub fn is_sentinel(&self) -> bool {
        self.ids.len() == 1 && self.ids[0] == SENTINEL_ID
    }
}

impl Default for IdentifierSet {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl Display for IdentifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ids.iter().join(", "))
    }
}

/// Reads `STUDENT_ID = <literal>` or `STUDENT_IDS = [<literal>, ...]` from
/// the top level of `source`.
///
/// Target names match case-insensitively and the first qualifying
/// assignment wins. Anything else (unparsable source, computed values, no
/// assignment at all) yields the sentinel. Never fails.
pub fn extract_identifiers(source: &str) -> IdentifierSet {
    match scan(source) {
        Ok(Some(ids)) => {
            tracing::info!("Submission belongs to {ids}");
            ids
        }
        Ok(None) => {
            tracing::warn!("No literal {STUDENT_ID_TARGET} assignment found, using {SENTINEL_ID}");
            IdentifierSet::sentinel()
        }
        Err(err) => {
            tracing::warn!("Could not read identifier cell ({err}), using {SENTINEL_ID}");
            IdentifierSet::sentinel()
        }
    }
}

/// Walks top-level assignments looking for the first qualifying one.
fn scan(source: &str) -> Result<Option<IdentifierSet>> {
    let parser = Parser::new(source)?;
    if parser.has_errors() {
        bail!("identifier cell has syntax errors");
    }

    let root = parser.root_node();
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        if statement.kind() != "expression_statement" {
            continue;
        }
        let Some(assignment) = statement
            .named_child(0)
            .filter(|n| n.kind() == "assignment")
        else {
            continue;
        };
        // `x: T = v` is an annotated assignment, not a plain one.
        if assignment.child_by_field_name("type").is_some() {
            continue;
        }

        let (targets, value) = unchain(assignment);
        let Some(value) = value else {
            continue;
        };

        for target in targets.into_iter().filter(|t| t.kind() == "identifier") {
            let name = parser.text(target)?.to_uppercase();

            if name == STUDENT_ID_TARGET
                && let Some(id) = constant(&parser, value)
            {
                return Ok(Some(IdentifierSet::single(id)));
            }

            if name == STUDENT_IDS_TARGET
                && let Some(items) = sequence_items(value)
            {
                let ids = items.into_iter().filter_map(|n| constant(&parser, n));
                return Ok(Some(IdentifierSet::from_values(ids)));
            }
        }
    }

    Ok(None)
}

/// Splits `a = b = value` into its targets and the final value.
fn unchain(assignment: Node<'_>) -> (Vec<Node<'_>>, Option<Node<'_>>) {
    let mut targets = Vec::new();
    let mut current = assignment;

    loop {
        targets.extend(current.child_by_field_name("left"));
        match current.child_by_field_name("right") {
            Some(right) if right.kind() == "assignment" => current = right,
            right => return (targets, right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(source: &str) -> Vec<String> {
        extract_identifiers(source).iter().map(str::to_string).collect()
    }

    #[test]
    fn single_literal() {
        assert_eq!(ids(r#"STUDENT_ID = "abc123""#), ["abc123"]);
    }

    #[test]
    fn group_list_and_tuple() {
        assert_eq!(ids(r#"STUDENT_IDS = ["a", "b"]"#), ["a", "b"]);
        assert_eq!(ids(r#"STUDENT_IDS = ("a", "b")"#), ["a", "b"]);
        assert_eq!(ids(r#"STUDENT_IDS = "a", "b""#), ["a", "b"]);
        assert!(extract_identifiers(r#"STUDENT_IDS = ["a", "b"]"#).is_group());
    }

    #[test]
    fn target_match_is_case_insensitive() {
        assert_eq!(ids("student_id = 'x1'"), ["x1"]);
        assert_eq!(ids("STUDENT_IDs = ['p', 'q']"), ["p", "q"]);
    }

    #[test]
    fn non_literal_group_elements_are_skipped() {
        assert_eq!(ids("STUDENT_IDS = ['a', other, f'x{y}', 7]"), ["a", "7"]);
    }

    #[test]
    fn computed_or_missing_values_fall_back() {
        assert_eq!(ids("STUDENT_ID = compute_id()"), [SENTINEL_ID]);
        assert_eq!(ids("print('hello')"), [SENTINEL_ID]);
        assert_eq!(ids(""), [SENTINEL_ID]);
        assert_eq!(ids("STUDENT_IDS = []"), [SENTINEL_ID]);
        assert_eq!(ids("STUDENT_IDS = [a, b]"), [SENTINEL_ID]);
        assert_eq!(ids("STUDENT_IDS = 'solo'"), [SENTINEL_ID]);
        assert!(extract_identifiers("x = 1").is_sentinel());
    }

    #[test]
    fn syntax_errors_fall_back() {
        assert_eq!(ids("STUDENT_ID = 'abc'\ndef broken(:\n"), [SENTINEL_ID]);
    }

    #[test]
    fn python2_only_source_falls_back() {
        assert_eq!(ids("print \"hi\"\nSTUDENT_ID = 'a'\n"), [SENTINEL_ID]);
        assert_eq!(ids("print(\"hi\")\nSTUDENT_ID = 'a'\n"), ["a"]);
    }

    #[test]
    fn only_top_level_plain_assignments_count() {
        assert_eq!(ids("if True:\n    STUDENT_ID = 'nested'\n"), [SENTINEL_ID]);
        assert_eq!(ids("def f():\n    STUDENT_ID = 'scoped'\n"), [SENTINEL_ID]);
        assert_eq!(ids("STUDENT_ID: str = 'annotated'"), [SENTINEL_ID]);
        assert_eq!(ids("STUDENT_ID += 'aug'"), [SENTINEL_ID]);
    }

    #[test]
    fn first_qualifying_assignment_wins() {
        let source = "STUDENT_ID = lookup()\nSTUDENT_ID = 'second'\nSTUDENT_ID = 'third'\n";
        assert_eq!(ids(source), ["second"]);

        let source = "STUDENT_IDS = ['g1', 'g2']\nSTUDENT_ID = 'solo'\n";
        assert_eq!(ids(source), ["g1", "g2"]);
    }

    #[test]
    fn chained_and_semicolon_separated_assignments() {
        assert_eq!(ids("other = STUDENT_ID = 'chained'"), ["chained"]);
        assert_eq!(ids("import os; STUDENT_ID = 'semi'"), ["semi"]);
    }

    #[test]
    fn numeric_literals_use_their_string_form() {
        assert_eq!(ids("STUDENT_ID = 900123456"), ["900123456"]);
        assert_eq!(ids("STUDENT_ID = 0x10"), ["16"]);
    }

    #[test]
    fn comments_and_surrounding_code_are_ignored() {
        let source = "# Fill in your id\nimport math\nSTUDENT_ID = 'abc'  # required\nprint(STUDENT_ID)\n";
        assert_eq!(ids(source), ["abc"]);
        let source = "STUDENT_IDS = [\n    'a',  # first\n    'b',\n]\n";
        assert_eq!(ids(source), ["a", "b"]);
    }

    #[test]
    fn display_joins_group_members() {
        let set = IdentifierSet::from_values(["a".to_string(), "b".to_string()]);
        assert_eq!(set.to_string(), "a, b");
        assert_eq!(IdentifierSet::from_values(Vec::new()), IdentifierSet::sentinel());
    }
}
