#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! A [`Runtime`] backed by a Python worker subprocess.
//!
//! The worker owns the real namespace dictionaries; requests and replies are
//! single JSON lines. See `worker.py` for the other end.

use std::{collections::BTreeMap, ffi::OsString, time::Duration};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    config::{GraderConfig, RuntimeCommand},
    process::{ExchangeError, LineChild},
    runtime::{Binding, Namespace, NamespaceId, Runtime, RuntimeError, TestRun},
};

/// Source of the worker, handed to the interpreter with `-c`.
const WORKER_SOURCE: &str = include_str!("worker.py");

/// Descriptor of a Python value as reported by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PyValue {
    /// `type(value).__name__`.
    #[serde(rename = "type")]
    type_name: String,
    /// Test method names, present only for `unittest.TestCase` subclasses.
    #[serde(default)]
    tests:     Option<Vec<String>>,
}

impl PyValue {
    /// Name of the value's Python type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl Binding for PyValue {
    fn test_methods(&self) -> Option<&[String]> {
        self.tests.as_deref()
    }
}

/// A request sent to the worker.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    /// Create an empty namespace.
    Create {
        /// New namespace id.
        ns:     NamespaceId,
        /// Value of `__name__`.
        module: &'a str,
    },
    /// Execute source in a namespace.
    Exec {
        /// Target namespace.
        ns:     NamespaceId,
        /// Source text.
        source: &'a str,
        /// File name used in tracebacks.
        origin: &'a str,
    },
    /// Copy a namespace into a new module.
    Fork {
        /// New namespace id.
        ns:     NamespaceId,
        /// Namespace being copied.
        from:   NamespaceId,
        /// Module name of the copy.
        module: &'a str,
    },
    /// Run test methods of one class in a single suite.
    Run {
        /// Namespace holding the test unit.
        ns:      NamespaceId,
        /// Name the test class is bound to.
        unit:    &'a str,
        /// Test method names, in run order.
        methods: &'a [String],
    },
    /// Forget a namespace.
    Release {
        /// Namespace to drop.
        ns: NamespaceId,
    },
}

/// A reply read back from the worker.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Reply {
    /// Bindings that changed or disappeared since the last report.
    Bound {
        /// New or rebound names.
        set:     BTreeMap<String, PyValue>,
        /// Names no longer bound.
        #[serde(default)]
        removed: Vec<String>,
    },
    /// Results of a test run, one per requested method.
    Outcomes {
        /// Outcomes in request order.
        runs: Vec<TestRun>,
    },
    /// Submitted code raised.
    Raised {
        /// Exception type name.
        kind:      String,
        /// `str(exc)`.
        message:   String,
        /// Formatted traceback.
        #[serde(default)]
        traceback: String,
    },
    /// The request itself was bad.
    Fault {
        /// Why it was rejected.
        message: String,
    },
    /// Acknowledgement with no payload.
    Done,
}

/// Runs submitted code in a persistent Python interpreter.
#[derive(Debug)]
pub struct PythonRuntime {
    /// The worker process.
    child:    LineChild,
    /// Next namespace id to hand out.
    next_id:  u64,
    /// Limit on any one request.
    deadline: Option<Duration>,
}

impl PythonRuntime {
    /// Starts a worker under `command`, e.g. `python3` or `sage -python`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(command: &RuntimeCommand, deadline: Option<Duration>) -> Result<Self> {
        let program = command.resolve()?;
        let mut args: Vec<OsString> = command.args().iter().map(OsString::from).collect();
        args.push("-c".into());
        args.push(WORKER_SOURCE.into());

        tracing::debug!("Starting execution worker with {}", command.program());
        let child = LineChild::spawn(&program, &args, "worker")
            .with_context(|| format!("Could not start {}", command.program()))?;

        Ok(Self {
            child,
            next_id: 0,
            deadline,
        })
    }

    /// Starts a worker with the interpreter and deadline from `config`.
    pub fn from_config(config: &GraderConfig) -> Result<Self> {
        Self::spawn(config.runtime(), config.exec_timeout())
    }

    /// Stops the worker, dropping every namespace it still holds.
    pub async fn shutdown(self) -> Result<()> {
        if let Some(status) = self.child.shutdown().await?
            && !status.success()
        {
            tracing::debug!("Execution worker exited with {status}");
        }
        Ok(())
    }

    /// Hands out a fresh namespace id.
    fn allocate(&mut self) -> NamespaceId {
        let id = NamespaceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Sends one request and decodes its reply. Raises and faults come back
    /// as errors.
    async fn request(&mut self, request: &Request<'_>) -> Result<Reply, RuntimeError> {
        let line = serde_json::to_string(request).context("Could not encode worker request")?;
        let reply = self
            .child
            .exchange(&line, self.deadline)
            .await
            .map_err(|err| match err {
                ExchangeError::Timeout(limit) => RuntimeError::Timeout(limit),
                other => RuntimeError::Worker(
                    anyhow::Error::new(other).context("Execution worker stopped responding"),
                ),
            })?;

        let reply: Reply = serde_json::from_str(&reply)
            .with_context(|| format!("Unreadable worker reply: {reply}"))?;
        match reply {
            Reply::Raised {
                kind,
                message,
                traceback,
            } => Err(RuntimeError::Raised {
                kind,
                message,
                traceback,
            }),
            Reply::Fault { message } => Err(RuntimeError::Fault(message)),
            reply => Ok(reply),
        }
    }
}

/// Applies a binding report to the grader-side mirror.
fn apply(namespace: &mut Namespace<PyValue>, reply: Reply) -> Result<(), RuntimeError> {
    match reply {
        Reply::Bound { set, removed } => {
            for name in removed {
                namespace.unbind(&name);
            }
            for (name, value) in set {
                namespace.bind(name, value);
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

/// A well-formed reply that does not answer the request sent.
fn unexpected(reply: Reply) -> RuntimeError {
    RuntimeError::Worker(anyhow!("Unexpected worker reply: {reply:?}"))
}

impl Runtime for PythonRuntime {
    type Value = PyValue;

    async fn create(&mut self, module: &str) -> Result<Namespace<PyValue>, RuntimeError> {
        let ns = self.allocate();
        let reply = self.request(&Request::Create { ns, module }).await?;

        let mut namespace = Namespace::new(ns, module);
        apply(&mut namespace, reply)?;
        Ok(namespace)
    }

    async fn execute(
        &mut self,
        namespace: &mut Namespace<PyValue>,
        source: &str,
        origin: &str,
    ) -> Result<(), RuntimeError> {
        let reply = self
            .request(&Request::Exec {
                ns: namespace.id(),
                source,
                origin,
            })
            .await?;
        apply(namespace, reply)
    }

    async fn fork(
        &mut self,
        namespace: &Namespace<PyValue>,
        module: &str,
    ) -> Result<Namespace<PyValue>, RuntimeError> {
        let ns = self.allocate();
        let reply = self
            .request(&Request::Fork {
                ns,
                from: namespace.id(),
                module,
            })
            .await?;

        let mut copy = Namespace::new(ns, module);
        apply(&mut copy, reply)?;
        Ok(copy)
    }

    async fn run_unit(
        &mut self,
        namespace: &Namespace<PyValue>,
        unit: &str,
        methods: &[String],
    ) -> Result<Vec<TestRun>, RuntimeError> {
        let reply = self
            .request(&Request::Run {
                ns: namespace.id(),
                unit,
                methods,
            })
            .await?;

        match reply {
            Reply::Outcomes { runs } if runs.len() == methods.len() => Ok(runs),
            other => Err(unexpected(other)),
        }
    }

    async fn release(&mut self, namespace: Namespace<PyValue>) -> Result<(), RuntimeError> {
        match self.request(&Request::Release { ns: namespace.id() }).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TestOutcome;

    #[test]
    fn requests_are_tagged_by_op() {
        let line = serde_json::to_string(&Request::Fork {
            ns:     NamespaceId(2),
            from:   NamespaceId(1),
            module: "student_tests",
        })
        .expect("encode");
        assert_eq!(
            line,
            r#"{"op":"fork","ns":2,"from":1,"module":"student_tests"}"#
        );

        let line = serde_json::to_string(&Request::Release { ns: NamespaceId(0) }).expect("encode");
        assert_eq!(line, r#"{"op":"release","ns":0}"#);
    }

    #[test]
    fn bound_replies_update_the_mirror() {
        let mut ns = Namespace::new(NamespaceId(0), "student");
        ns.bind("stale", PyValue {
            type_name: "int".into(),
            tests:     None,
        });

        let reply: Reply = serde_json::from_str(
            r#"{"status":"bound","set":{"T":{"type":"type","tests":["test_a"]},"x":{"type":"int"}},"removed":["stale"]}"#,
        )
        .expect("decode");
        apply(&mut ns, reply).expect("apply");

        assert!(!ns.contains("stale"));
        assert_eq!(ns.get("x").map(PyValue::type_name), Some("int"));
        let units: Vec<_> = ns.test_units().collect();
        assert_eq!(units, vec![("T", &["test_a".to_string()][..])]);
    }

    #[test]
    fn outcome_replies_decode() {
        let reply: Reply = serde_json::from_str(
            r#"{"status":"outcomes","runs":[{"outcome":"failure","detail":"boom"},{"outcome":"pass","detail":null}]}"#,
        )
        .expect("decode");
        let Reply::Outcomes { runs } = reply else {
            panic!("expected an outcomes reply");
        };
        assert_eq!(runs, vec![
            TestRun {
                outcome: TestOutcome::Failure,
                detail:  Some("boom".into()),
            },
            TestRun {
                outcome: TestOutcome::Pass,
                detail:  None,
            },
        ]);
    }

    #[test]
    fn run_requests_carry_every_method() {
        let methods = vec!["test_a".to_string(), "test_b".to_string()];
        let line = serde_json::to_string(&Request::Run {
            ns:      NamespaceId(3),
            unit:    "T",
            methods: &methods,
        })
        .expect("encode");
        assert_eq!(
            line,
            r#"{"op":"run","ns":3,"unit":"T","methods":["test_a","test_b"]}"#
        );
    }

    #[test]
    fn non_binding_replies_are_rejected_by_apply() {
        let mut ns = Namespace::new(NamespaceId(0), "student");
        let err = apply(&mut ns, Reply::Done).unwrap_err();
        assert!(matches!(err, RuntimeError::Worker(_)));
    }
}
