#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! A long-lived child process spoken to one line at a time.

use std::{
    ffi::{OsStr, OsString},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
    task::JoinHandle,
    time::timeout,
};

/// How long a child gets to exit on its own after stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Drop guard that terminates a spawned child process if callers forget to
/// shut it down.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Kills the child now; the guard stays armed but empty.
    fn kill(&mut self) {
        if let Some(mut child) = self.0.take() {
            let _ = child.start_kill();
        }
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// A request/reply exchange did not produce a reply.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// No reply before the deadline; the child has been killed.
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// The child closed its output or was killed earlier.
    #[error("Child process exited")]
    Closed,

    /// Reading or writing the pipes failed.
    #[error("Child process I/O failed")]
    Io(#[from] std::io::Error),
}

/// A child process exchanging newline-terminated messages over stdin/stdout.
/// Its stderr is forwarded to `tracing` at debug level.
pub struct LineChild {
    /// Kills the child on drop.
    guard:   ChildDropGuard,
    /// Request channel.
    stdin:   Option<ChildStdin>,
    /// Reply channel.
    stdout:  Lines<BufReader<ChildStdout>>,
    /// Task draining stderr.
    drainer: JoinHandle<()>,
}

impl std::fmt::Debug for LineChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineChild")
            .field("alive", &self.guard.0.is_some())
            .finish()
    }
}

impl LineChild {
    /// Spawns `program` with piped stdin, stdout and stderr. `label` tags the
    /// forwarded stderr lines.
    pub fn spawn(program: impl AsRef<OsStr>, args: &[OsString], label: &str) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut guard = ChildDropGuard::new(cmd.spawn().context("failed to spawn process")?);
        let child = guard.child_mut()?;
        let stdin = child.stdin.take().context("missing stdin pipe")?;
        let stdout = child.stdout.take().context("missing stdout pipe")?;
        let stderr = child.stderr.take().context("missing stderr pipe")?;

        let label = label.to_string();
        // Read raw bytes; non-UTF-8 output must never end the drain.
        let drainer = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        tracing::debug!("[{label}] {}", line.trim_end());
                    }
                }
            }
        });

        Ok(Self {
            guard,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            drainer,
        })
    }

    /// Writes `line` and waits for the next line of output.
    ///
    /// When `deadline` passes first, the child is killed and every later
    /// exchange fails with [`ExchangeError::Closed`].
    pub async fn exchange(
        &mut self,
        line: &str,
        deadline: Option<Duration>,
    ) -> Result<String, ExchangeError> {
        let reply = match deadline {
            Some(limit) => match timeout(limit, self.round_trip(line)).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.kill();
                    return Err(ExchangeError::Timeout(limit));
                }
            },
            None => self.round_trip(line).await,
        };

        if matches!(reply, Err(ExchangeError::Closed)) {
            self.kill();
        }
        reply
    }

    /// Writes one line and reads one line back.
    async fn round_trip(&mut self, line: &str) -> Result<String, ExchangeError> {
        let stdin = self.stdin.as_mut().ok_or(ExchangeError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        self.stdout
            .next_line()
            .await?
            .ok_or(ExchangeError::Closed)
    }

    /// Kills the child immediately.
    pub fn kill(&mut self) {
        self.stdin = None;
        self.guard.kill();
    }

    /// Closes stdin and waits for the child to exit, killing it if it does
    /// not do so promptly.
    pub async fn shutdown(mut self) -> Result<Option<ExitStatus>> {
        self.stdin = None;
        let waited = match self.guard.0.as_mut() {
            Some(child) => Some(timeout(SHUTDOWN_GRACE, child.wait()).await),
            None => None,
        };
        let status = match waited {
            Some(Ok(status)) => Some(status.context("failed to wait on process")?),
            Some(Err(_)) => {
                tracing::warn!("Child did not exit after stdin closed, killing it");
                self.guard.kill();
                None
            }
            None => None,
        };

        self.guard.disarm();
        let _ = self.drainer.await;
        Ok(status)
    }
}
