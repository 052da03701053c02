//! External solver processes
//!
//! Runs a solver binary, feeds it a problem on stdin and collects its
//! output while staying responsive to cancellation:
//!
//! - a writer thread sends the input and closes stdin
//! - a reader thread forwards stdout lines over an `mpsc` channel
//! - a third thread drains stderr
//! - the calling thread polls the channel with a timeout and checks the
//!   cancellation token (and the optional deadline) between polls, then
//!   polls the child the same way until it exits
//!
//! On cancellation or timeout the child is killed, which closes its pipes and
//! lets the helper threads finish, and then reaped.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::core::CancellationToken;
use crate::error::{ErrorCode, UelError};

/// Errors from running an external process
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while talking to {command}: {message}")]
    Io { command: String, message: String },

    #[error("{command} was cancelled")]
    Cancelled { command: String },

    #[error("{command} exceeded the time limit of {limit:?}")]
    TimedOut { command: String, limit: Duration },
}

impl From<ProcessError> for UelError {
    fn from(err: ProcessError) -> Self {
        match &err {
            ProcessError::Spawn { command, source } => {
                let code = if source.kind() == std::io::ErrorKind::NotFound {
                    ErrorCode::ExternalSolverNotFound
                } else {
                    ErrorCode::ExternalSolverFailure
                };
                UelError::new(code, err.to_string())
                    .with_context("solver", command.clone())
                    .with_hint("check the solver command in the [sat] or [asp] config section")
            }
            ProcessError::Io { command, .. } => {
                UelError::new(ErrorCode::ProcessIo, err.to_string())
                    .with_context("solver", command.clone())
            }
            ProcessError::Cancelled { .. } => UelError::cancelled(),
            ProcessError::TimedOut { command, limit } => UelError::new(
                ErrorCode::ResourceLimit,
                err.to_string(),
            )
            .with_context("solver", command.clone())
            .with_context("limit_secs", limit.as_secs().to_string()),
        }
    }
}

/// Everything a finished process produced
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<String>,
    pub stderr: String,
}

impl ProcessOutput {
    /// Exit code, if the process exited normally
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// All stdout lines joined back together
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }
}

/// A solver command line
#[derive(Debug, Clone)]
pub struct SolverProcess {
    program: PathBuf,
    args: Vec<String>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl SolverProcess {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            poll_interval: Duration::from_millis(50),
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the process to completion with `input` on stdin
    pub fn run(
        &self,
        input: String,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        let command = self.command_line();
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { command });
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn { command: command.clone(), source })?;
        debug!(command = %command, pid = child.id(), bytes = input.len(), "spawned solver");

        let io_error = |message: &str| ProcessError::Io {
            command: command.clone(),
            message: message.to_string(),
        };

        let mut stdin = child.stdin.take().ok_or_else(|| io_error("stdin is not piped"))?;
        let stdout = child.stdout.take().ok_or_else(|| io_error("stdout is not piped"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| io_error("stderr is not piped"))?;

        // A solver may exit before reading all of its input
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(input.as_bytes());
        });

        let (tx, rx) = mpsc::channel::<std::io::Result<String>>();
        let reader = thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        let stderr_reader = thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        });

        let started = Instant::now();
        let mut lines = Vec::new();
        let outcome = loop {
            if cancel.is_cancelled() {
                break Err(ProcessError::Cancelled { command: command.clone() });
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    break Err(ProcessError::TimedOut { command: command.clone(), limit });
                }
            }
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(line)) => {
                    trace!(line = %line, "solver output");
                    lines.push(line);
                }
                Ok(Err(e)) => break Err(io_error(&e.to_string())),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Ok(()),
            }
        };

        // stdout may close long before the solver exits
        let waited = outcome.and_then(|()| loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) => {}
                Err(e) => break Err(io_error(&e.to_string())),
            }
            if cancel.is_cancelled() {
                break Err(ProcessError::Cancelled { command: command.clone() });
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    break Err(ProcessError::TimedOut { command: command.clone(), limit });
                }
            }
            thread::sleep(self.poll_interval);
        });

        let status = match waited {
            Ok(status) => status,
            Err(err) => {
                kill(&mut child, &command);
                let _ = writer.join();
                let _ = reader.join();
                let _ = stderr_reader.join();
                return Err(err);
            }
        };
        let _ = writer.join();
        let _ = reader.join();
        let stderr = stderr_reader.join().unwrap_or_default();
        debug!(
            command = %command,
            status = ?status.code(),
            lines = lines.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solver finished"
        );

        Ok(ProcessOutput { status, stdout: lines, stderr })
    }
}

fn kill(child: &mut Child, command: &str) {
    if let Err(e) = child.kill() {
        warn!(command = %command, error = %e, "failed to kill solver");
    }
    match child.wait() {
        Ok(status) => debug!(command = %command, status = ?status.code(), "solver killed"),
        Err(e) => warn!(command = %command, error = %e, "failed to reap solver"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_echo_through_cat() {
        let output = SolverProcess::new("cat")
            .run("line one\nline two\n".to_string(), &CancellationToken::new())
            .unwrap();
        assert_eq!(output.code(), Some(0));
        assert_eq!(output.stdout, vec!["line one", "line two"]);
    }

    #[test]
    fn test_missing_binary() {
        let err = SolverProcess::new("uel-definitely-not-installed")
            .run(String::new(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        let err: UelError = err.into();
        assert_eq!(err.code, ErrorCode::ExternalSolverNotFound);
    }

    #[test]
    fn test_cancel_kills_long_running_process() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });
        let started = Instant::now();
        let err = SolverProcess::new("sleep")
            .args(["30"])
            .poll_interval(Duration::from_millis(10))
            .run(String::new(), &token)
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_cancel_after_stdout_is_closed() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });
        let started = Instant::now();
        let err = SolverProcess::new("sh")
            .args(["-c", "exec >&- 2>&-; exec sleep 30"])
            .poll_interval(Duration::from_millis(10))
            .run(String::new(), &token)
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, ProcessError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_timeout() {
        let err = SolverProcess::new("sleep")
            .args(["30"])
            .poll_interval(Duration::from_millis(10))
            .timeout(Some(Duration::from_millis(100)))
            .run(String::new(), &CancellationToken::new())
            .unwrap_err();
        let err: UelError = err.into();
        assert_eq!(err.code, ErrorCode::ResourceLimit);
    }

    #[test]
    fn test_exit_status_is_reported() {
        let output = SolverProcess::new("sh")
            .args(["-c", "echo s UNSATISFIABLE; exit 20"])
            .run(String::new(), &CancellationToken::new())
            .unwrap();
        assert_eq!(output.code(), Some(20));
        assert_eq!(output.stdout_text(), "s UNSATISFIABLE");
    }
}
