#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The boundary between the grader and whatever runs submitted code.
//!
//! Submitted code never runs in this process. A [`Runtime`] owns the actual
//! values; a [`Namespace`] is the grader's view of one runtime-side table,
//! mirroring every bound name together with a descriptor of its value.

use std::{collections::BTreeMap, fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime-assigned handle of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId(pub u64);

impl Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ns{}", self.0)
    }
}

/// What the grader knows about a value bound in a namespace.
pub trait Binding: Clone + std::fmt::Debug {
    /// Test operations declared by this value, in run order, when the value is
    /// a test unit. `None` for everything else.
    fn test_methods(&self) -> Option<&[String]>;
}

/// A name → value table living inside a runtime.
///
/// Not `Clone`: the only way to copy one is [`Runtime::fork`], which copies
/// the runtime-side table as well.
#[derive(Debug)]
pub struct Namespace<V> {
    /// Handle of the runtime-side table.
    id:       NamespaceId,
    /// Module name the namespace was seeded with.
    module:   String,
    /// Mirror of the runtime-side bindings.
    bindings: BTreeMap<String, V>,
}

impl<V: Binding> Namespace<V> {
    /// Creates the grader-side view of a freshly created runtime table.
    pub fn new(id: NamespaceId, module: impl Into<String>) -> Self {
        Self {
            id,
            module: module.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Runtime handle.
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Module name this namespace was seeded with.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Looks up a bound name.
    pub fn get(&self, name: &str) -> Option<&V> {
        self.bindings.get(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bound names with their values, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Records a binding made on the runtime side; redefinition overwrites.
    pub fn bind(&mut self, name: impl Into<String>, value: V) {
        self.bindings.insert(name.into(), value);
    }

    /// Records a binding removed on the runtime side.
    pub fn unbind(&mut self, name: &str) -> Option<V> {
        self.bindings.remove(name)
    }

    /// Test units in name order, paired with their declared test methods.
    pub fn test_units(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.iter()
            .filter_map(|(name, value)| value.test_methods().map(|methods| (name, methods)))
    }
}

/// Result of running one test operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    /// The test held. Skips and expected failures also count here.
    Pass,
    /// An assertion did not hold.
    Failure,
    /// Some other exception escaped the test.
    Error,
}

impl TestOutcome {
    /// Whether the outcome counts towards `passed`.
    pub fn is_pass(self) -> bool {
        self == TestOutcome::Pass
    }
}

impl Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestOutcome::Pass => write!(f, "pass"),
            TestOutcome::Failure => write!(f, "failure"),
            TestOutcome::Error => write!(f, "error"),
        }
    }
}

/// Outcome of a single test operation plus whatever the runtime reported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestRun {
    /// Pass, failure or error.
    pub outcome: TestOutcome,
    /// Traceback or message for failures and errors.
    #[serde(default)]
    pub detail:  Option<String>,
}

/// Errors surfaced by an execution runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Submitted code raised.
    #[error("{kind}: {message}")]
    Raised {
        /// Exception type name.
        kind:      String,
        /// Exception message.
        message:   String,
        /// Formatted traceback, when available.
        traceback: String,
    },

    /// A request did not finish before the configured deadline.
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    /// The runtime understood the request but refused it.
    #[error("Execution runtime rejected the request: {0}")]
    Fault(String),

    /// The runtime could not be reached, crashed, or replied with garbage.
    #[error("Execution runtime failed: {0:#}")]
    Worker(#[from] anyhow::Error),
}

impl RuntimeError {
    /// Exception type name for raises.
    pub fn exception_kind(&self) -> Option<&str> {
        match self {
            RuntimeError::Raised { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Executes untrusted source text against namespaces it owns.
///
/// Implementations are expected to live behind a process or container
/// boundary. Every call is awaited to completion before the next is made.
#[allow(async_fn_in_trait)]
pub trait Runtime {
    /// Grader-side descriptor of a runtime value.
    type Value: Binding;

    /// Creates an empty namespace carrying only the module marker.
    async fn create(&mut self, module: &str) -> Result<Namespace<Self::Value>, RuntimeError>;

    /// Runs `source` in `namespace`, updating its bindings. `origin` labels
    /// the source in tracebacks.
    async fn execute(
        &mut self,
        namespace: &mut Namespace<Self::Value>,
        source: &str,
        origin: &str,
    ) -> Result<(), RuntimeError>;

    /// Copies every binding of `namespace` into a new namespace seeded as
    /// `module`. Later changes to either side are invisible to the other.
    async fn fork(
        &mut self,
        namespace: &Namespace<Self::Value>,
        module: &str,
    ) -> Result<Namespace<Self::Value>, RuntimeError>;

    /// Runs `methods` of the test unit bound to `unit` as one batch, so
    /// fixtures shared by the unit run once. Returns one run per method, in
    /// the order given.
    ///
    /// A failing unit-level fixture makes every method that would otherwise
    /// have passed an error.
    async fn run_unit(
        &mut self,
        namespace: &Namespace<Self::Value>,
        unit: &str,
        methods: &[String],
    ) -> Result<Vec<TestRun>, RuntimeError>;

    /// Frees the runtime side of a namespace.
    async fn release(&mut self, namespace: Namespace<Self::Value>) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Plain(Option<Vec<String>>);

    impl Binding for Plain {
        fn test_methods(&self) -> Option<&[String]> {
            self.0.as_deref()
        }
    }

    #[test]
    fn test_units_are_ordered_by_name() {
        let mut ns = Namespace::new(NamespaceId(1), "student");
        ns.bind("ZetaTests", Plain(Some(vec!["test_z".into()])));
        ns.bind("helper", Plain(None));
        ns.bind("AlphaTests", Plain(Some(vec!["test_a".into(), "test_b".into()])));

        let units: Vec<(&str, usize)> = ns.test_units().map(|(n, m)| (n, m.len())).collect();
        assert_eq!(units, vec![("AlphaTests", 2), ("ZetaTests", 1)]);
    }

    #[test]
    fn rebinding_overwrites() {
        let mut ns = Namespace::new(NamespaceId(7), "student");
        ns.bind("x", Plain(None));
        ns.bind("x", Plain(Some(vec![])));
        assert_eq!(ns.len(), 1);
        assert!(ns.get("x").and_then(|v| v.test_methods()).is_some());
        assert!(ns.unbind("x").is_some());
        assert!(ns.is_empty());
    }
}
