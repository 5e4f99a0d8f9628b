//! Snippet execution in isolated child processes.
//!
//! Each execution spawns a fresh interpreter process with the snippet source
//! piped on stdin and a scratch temp directory as its working directory, so
//! no state leaks between invocations. Output is drained on reader threads
//! with a byte limit while the child runs, avoiding pipe deadlocks.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::catalog::Snippet;
use crate::config::RunConfig;

/// Per-execution limits and interpreter selection.
#[derive(Debug, Clone)]
pub struct ExecLimits {
    /// Maximum wall-clock time before the child is killed.
    pub timeout: Duration,
    /// Maximum bytes to keep from each of stdout/stderr.
    pub output_limit_bytes: usize,
    /// Default interpreter argv; snippets may override.
    pub interpreter: Vec<String>,
}

impl ExecLimits {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            timeout: Duration::from_millis(cfg.timeout_ms),
            output_limit_bytes: cfg.output_limit_bytes,
            interpreter: cfg.interpreter.clone(),
        }
    }
}

/// Why a snippet execution did not complete cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecError {
    /// The snippet exceeded its wall-clock budget and was killed.
    Timeout,
    /// The snippet exited non-zero or could not be started.
    RuntimeFailure { message: String },
}

/// Outcome of one snippet execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub snippet_id: String,
    pub actual_output: String,
    pub error: Option<ExecError>,
    pub duration_ms: u64,
}

/// Run one snippet to completion.
///
/// Snippet-level failures (spawn error, non-zero exit, timeout) are captured
/// in the returned result and never abort the run; only infrastructure
/// errors (a panicked reader thread) surface as `Err`.
#[instrument(skip_all, fields(snippet_id = %snippet.id))]
pub fn run_snippet(snippet: &Snippet, limits: &ExecLimits) -> Result<ExecutionResult> {
    let interpreter = snippet
        .interpreter
        .as_deref()
        .unwrap_or(&limits.interpreter);
    let started = Instant::now();

    // Catalog validation rejects empty argvs, but the library surface does
    // not; treat it as a snippet-level failure rather than indexing blindly.
    let Some(program) = interpreter.first() else {
        return Ok(failure(snippet, started, "interpreter argv is empty".to_string()));
    };

    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            return Ok(failure(snippet, started, format!("create scratch dir: {err}")));
        }
    };

    debug!(interpreter = ?interpreter, "spawning snippet process");
    let mut child = match Command::new(program)
        .args(&interpreter[1..])
        .current_dir(scratch.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return Ok(failure(
                snippet,
                started,
                format!("spawn {}: {err}", program),
            ));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let (stdout_tx, stdout_rx) = mpsc::channel();
    let (stderr_tx, stderr_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = stdout_tx.send(read_stream_limited(stdout, limit));
    });
    thread::spawn(move || {
        let _ = stderr_tx.send(read_stream_limited(stderr, limit));
    });

    // Feed the source on its own thread: once the source outgrows the pipe
    // buffer, a child that never drains stdin would otherwise block the
    // worker past its wall-clock budget. The child may also exit without
    // draining stdin; its exit status is the signal that matters, not the
    // broken pipe.
    if let Some(mut child_stdin) = child.stdin.take() {
        let source = snippet.source.clone().into_bytes();
        thread::spawn(move || {
            if let Err(err) = child_stdin.write_all(&source) {
                debug!(err = %err, "stdin write incomplete");
            }
        });
    }

    let mut timed_out = false;
    let status = match child.wait_timeout(limits.timeout).context("wait for snippet")? {
        Some(status) => status,
        None => {
            warn!(timeout_ms = limits.timeout.as_millis() as u64, "snippet timed out, killing");
            timed_out = true;
            child.kill().context("kill snippet")?;
            child.wait().context("wait snippet after kill")?
        }
    };

    let (stdout, stdout_truncated) = recv_output(&stdout_rx, timed_out).context("collect stdout")?;
    let (stderr, stderr_truncated) = recv_output(&stderr_rx, timed_out).context("collect stderr")?;
    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    let duration_ms = elapsed_ms(started);
    let actual_output = String::from_utf8_lossy(&stdout).to_string();

    let error = if timed_out {
        Some(ExecError::Timeout)
    } else if status.success() {
        None
    } else {
        let stderr_text = String::from_utf8_lossy(&stderr);
        let message = match stderr_text.trim() {
            "" => format!("exit code {:?}", status.code()),
            trimmed => trimmed.to_string(),
        };
        Some(ExecError::RuntimeFailure { message })
    };

    debug!(exit_code = ?status.code(), timed_out, duration_ms, "snippet finished");
    Ok(ExecutionResult {
        snippet_id: snippet.id.clone(),
        actual_output,
        error,
        duration_ms,
    })
}

fn failure(snippet: &Snippet, started: Instant, message: String) -> ExecutionResult {
    ExecutionResult {
        snippet_id: snippet.id.clone(),
        actual_output: String::new(),
        error: Some(ExecError::RuntimeFailure { message }),
        duration_ms: elapsed_ms(started),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// How long to wait for reader threads after killing a timed-out child.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(500);

fn recv_output(
    rx: &mpsc::Receiver<Result<(Vec<u8>, usize)>>,
    timed_out: bool,
) -> Result<(Vec<u8>, usize)> {
    if timed_out {
        // A killed interpreter can leave grandchildren holding the pipe
        // open; they must not hold the worker slot as well. The reader
        // thread finishes on its own once the pipe closes.
        return match rx.recv_timeout(KILL_DRAIN_GRACE) {
            Ok(result) => result,
            Err(_) => Ok((Vec::new(), 0)),
        };
    }
    match rx.recv() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(timeout_ms: u64, output_limit_bytes: usize) -> ExecLimits {
        ExecLimits {
            timeout: Duration::from_millis(timeout_ms),
            output_limit_bytes,
            interpreter: vec!["sh".to_string()],
        }
    }

    fn snippet(id: &str, source: &str) -> Snippet {
        Snippet {
            id: id.to_string(),
            description: String::new(),
            source: source.to_string(),
            expected_output: None,
            interpreter: None,
        }
    }

    #[test]
    fn captures_stdout() {
        let result = run_snippet(&snippet("echo", "echo 5"), &limits(5_000, 1024)).expect("run");
        assert_eq!(result.actual_output, "5\n");
        assert!(result.error.is_none());
        assert_eq!(result.snippet_id, "echo");
    }

    #[test]
    fn nonzero_exit_is_runtime_failure() {
        let result = run_snippet(&snippet("boom", "echo boom >&2; exit 3"), &limits(5_000, 1024))
            .expect("run");
        match result.error {
            Some(ExecError::RuntimeFailure { message }) => assert!(message.contains("boom")),
            other => panic!("expected runtime failure, got {:?}", other),
        }
    }

    #[test]
    fn runtime_failure_without_stderr_reports_exit_code() {
        let result = run_snippet(&snippet("silent", "exit 7"), &limits(5_000, 1024)).expect("run");
        match result.error {
            Some(ExecError::RuntimeFailure { message }) => assert!(message.contains('7')),
            other => panic!("expected runtime failure, got {:?}", other),
        }
    }

    #[test]
    fn timeout_kills_the_child() {
        let result =
            run_snippet(&snippet("sleepy", "sleep 30"), &limits(100, 1024)).expect("run");
        assert_eq!(result.error, Some(ExecError::Timeout));
    }

    #[test]
    fn timeout_enforced_when_child_ignores_stdin() {
        // Source larger than the OS pipe buffer, fed to a child that never
        // reads stdin: the wall-clock budget must still win.
        let mut stubborn = snippet("stubborn", &"x".repeat(1 << 20));
        stubborn.interpreter = Some(vec!["sleep".to_string(), "30".to_string()]);
        let started = std::time::Instant::now();
        let result = run_snippet(&stubborn, &limits(200, 1024)).expect("run");
        assert_eq!(result.error, Some(ExecError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn empty_interpreter_argv_is_runtime_failure() {
        let mut bad = snippet("no-argv", "echo 5");
        bad.interpreter = Some(Vec::new());
        let result = run_snippet(&bad, &limits(5_000, 1024)).expect("run");
        match result.error {
            Some(ExecError::RuntimeFailure { message }) => {
                assert!(message.contains("interpreter"));
            }
            other => panic!("expected runtime failure, got {:?}", other),
        }
    }

    #[test]
    fn missing_interpreter_is_runtime_failure() {
        let mut bad = snippet("no-interp", "whatever");
        bad.interpreter = Some(vec!["definitely-not-a-real-binary-0x9".to_string()]);
        let result = run_snippet(&bad, &limits(5_000, 1024)).expect("run");
        match result.error {
            Some(ExecError::RuntimeFailure { message }) => assert!(message.contains("spawn")),
            other => panic!("expected runtime failure, got {:?}", other),
        }
    }

    #[test]
    fn output_is_truncated_at_limit() {
        let result =
            run_snippet(&snippet("wide", "printf abcdef"), &limits(5_000, 4)).expect("run");
        assert_eq!(result.actual_output, "abcd");
    }

    #[test]
    fn executions_are_isolated() {
        // A file written by one snippet is invisible to the next: each run
        // gets a fresh scratch directory.
        let writer = snippet("writer", "echo payload > shared.txt");
        let reader = snippet("reader", "test -f shared.txt && echo found || echo absent");
        run_snippet(&writer, &limits(5_000, 1024)).expect("writer");
        let result = run_snippet(&reader, &limits(5_000, 1024)).expect("reader");
        assert_eq!(result.actual_output, "absent\n");
    }
}
