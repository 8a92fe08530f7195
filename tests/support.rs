//! Shared helpers for integration tests.
//!
//! `ScriptedRuntime` stands in for Python. Its "language" is one statement
//! per line:
//!
//! ```text
//! let NAME                      bind NAME
//! need NAME                     raise NameError unless NAME is bound
//! del NAME                      unbind NAME
//! raise MESSAGE                 raise ValueError(MESSAGE)
//! case NAME: a=pass b=fail      bind a test unit; outcomes are pass|fail|error
//! ```
//!
//! Blank lines and lines starting with `#` are ignored; anything else is a
//! SyntaxError.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use nbgrade::runtime::{
    Binding, Namespace, NamespaceId, Runtime, RuntimeError, TestOutcome, TestRun,
};
use serde_json::{Value, json};

/// A value in the scripted runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Val {
    pub tests:    Option<Vec<String>>,
    pub outcomes: BTreeMap<String, TestOutcome>,
}

impl Val {
    fn plain() -> Self {
        Self {
            tests:    None,
            outcomes: BTreeMap::new(),
        }
    }
}

impl Binding for Val {
    fn test_methods(&self) -> Option<&[String]> {
        self.tests.as_deref()
    }
}

/// Deterministic in-memory runtime.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    next_id:      u64,
    spaces:       HashMap<NamespaceId, BTreeMap<String, Val>>,
    /// Every source passed to `execute`, with its origin.
    pub executed: Vec<(String, String)>,
    /// Every `(unit, method)` passed to `run_unit`.
    pub ran:      Vec<(String, String)>,
    /// Every unit passed to `run_unit`, once per call.
    pub batches:  Vec<String>,
    /// Makes `fork` fail.
    pub fail_fork: bool,
}

fn raised(kind: &str, message: impl Into<String>) -> RuntimeError {
    RuntimeError::Raised {
        kind:      kind.to_string(),
        message:   message.into(),
        traceback: String::new(),
    }
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespaces created and not yet released.
    pub fn live(&self) -> usize {
        self.spaces.len()
    }

    fn allocate(&mut self) -> NamespaceId {
        let id = NamespaceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn run_statement(table: &mut BTreeMap<String, Val>, line: &str) -> Result<(), RuntimeError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        match word {
            "let" => {
                table.insert(rest.to_string(), Val::plain());
            }
            "need" if !table.contains_key(rest) => {
                return Err(raised("NameError", format!("name '{rest}' is not defined")));
            }
            "need" => {}
            "del" => {
                table.remove(rest);
            }
            "raise" => return Err(raised("ValueError", rest)),
            "case" => {
                let (name, methods) = rest
                    .split_once(':')
                    .ok_or_else(|| raised("SyntaxError", line))?;
                let mut val = Val {
                    tests:    Some(Vec::new()),
                    outcomes: BTreeMap::new(),
                };
                for entry in methods.split_whitespace() {
                    let (method, outcome) = entry
                        .split_once('=')
                        .ok_or_else(|| raised("SyntaxError", line))?;
                    let outcome = match outcome {
                        "pass" => TestOutcome::Pass,
                        "fail" => TestOutcome::Failure,
                        "error" => TestOutcome::Error,
                        _ => return Err(raised("SyntaxError", line)),
                    };
                    val.tests.get_or_insert_with(Vec::new).push(method.to_string());
                    val.outcomes.insert(method.to_string(), outcome);
                }
                table.insert(name.trim().to_string(), val);
            }
            _ => return Err(raised("SyntaxError", line)),
        }
        Ok(())
    }

    fn sync(&self, namespace: &mut Namespace<Val>) {
        let table = &self.spaces[&namespace.id()];
        let stale: Vec<String> = namespace
            .iter()
            .map(|(name, _)| name.to_string())
            .filter(|name| !table.contains_key(name))
            .collect();
        for name in stale {
            namespace.unbind(&name);
        }
        for (name, value) in table {
            namespace.bind(name.clone(), value.clone());
        }
    }
}

impl Runtime for ScriptedRuntime {
    type Value = Val;

    async fn create(&mut self, module: &str) -> Result<Namespace<Val>, RuntimeError> {
        let id = self.allocate();
        let mut table = BTreeMap::new();
        table.insert("__name__".to_string(), Val::plain());
        self.spaces.insert(id, table);

        let mut namespace = Namespace::new(id, module);
        self.sync(&mut namespace);
        Ok(namespace)
    }

    async fn execute(
        &mut self,
        namespace: &mut Namespace<Val>,
        source: &str,
        origin: &str,
    ) -> Result<(), RuntimeError> {
        self.executed.push((origin.to_string(), source.to_string()));
        let table = self
            .spaces
            .get_mut(&namespace.id())
            .ok_or_else(|| RuntimeError::Fault(format!("no namespace {}", namespace.id())))?;
        for line in source.lines() {
            Self::run_statement(table, line)?;
        }
        self.sync(namespace);
        Ok(())
    }

    async fn fork(
        &mut self,
        namespace: &Namespace<Val>,
        module: &str,
    ) -> Result<Namespace<Val>, RuntimeError> {
        if self.fail_fork {
            return Err(RuntimeError::Fault("fork refused".into()));
        }
        let table = self
            .spaces
            .get(&namespace.id())
            .cloned()
            .ok_or_else(|| RuntimeError::Fault(format!("no namespace {}", namespace.id())))?;
        let id = self.allocate();
        self.spaces.insert(id, table);

        let mut copy = Namespace::new(id, module);
        self.sync(&mut copy);
        Ok(copy)
    }

    async fn run_unit(
        &mut self,
        namespace: &Namespace<Val>,
        unit: &str,
        methods: &[String],
    ) -> Result<Vec<TestRun>, RuntimeError> {
        let val = self
            .spaces
            .get(&namespace.id())
            .and_then(|table| table.get(unit))
            .ok_or_else(|| RuntimeError::Fault(format!("no unit {unit}")))?;
        self.batches.push(unit.to_string());

        let mut runs = Vec::new();
        for method in methods {
            self.ran.push((unit.to_string(), method.clone()));
            let outcome = val
                .outcomes
                .get(method)
                .copied()
                .unwrap_or(TestOutcome::Error);
            runs.push(TestRun {
                outcome,
                detail: (!outcome.is_pass()).then(|| format!("{unit}.{method} did not pass")),
            });
        }
        Ok(runs)
    }

    async fn release(&mut self, namespace: Namespace<Val>) -> Result<(), RuntimeError> {
        self.spaces.remove(&namespace.id());
        Ok(())
    }
}

/// A fresh empty directory under the system temp dir.
pub fn scratch_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// A code cell as nbformat JSON. Sources are stored as a list of lines, the
/// way Jupyter writes them.
pub fn code(source: &str, tags: &[&str]) -> Value {
    json!({
        "cell_type": "code",
        "execution_count": null,
        "metadata": { "tags": tags },
        "outputs": [],
        "source": source.split_inclusive('\n').collect::<Vec<_>>(),
    })
}

/// A markdown cell as nbformat JSON.
pub fn markdown(source: &str) -> Value {
    json!({
        "cell_type": "markdown",
        "metadata": {},
        "source": source,
    })
}

/// Writes an nbformat v4 document with `cells` and returns its path.
pub fn write_notebook(dir: &Path, name: &str, cells: Vec<Value>) -> PathBuf {
    let notebook = json!({
        "cells": cells,
        "metadata": {
            "kernelspec": { "name": "python3", "display_name": "Python 3", "language": "python" }
        },
        "nbformat": 4,
        "nbformat_minor": 5,
    });
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(&notebook).expect("encode"))
        .expect("write notebook");
    path
}
