//! Parallel snippet execution.
//!
//! Workers pull snippets off a shared cursor and send results to a single
//! aggregating receiver, so totals stay deterministic under any worker
//! count. A timed-out snippet only costs its own worker slot; the thread
//! moves on to the next index once the child is killed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::catalog::Snippet;
use crate::executor::{ExecLimits, ExecutionResult, run_snippet};

/// Execute all snippets on up to `workers` threads.
///
/// Results are returned in completion order; the report re-sequences them.
#[instrument(skip_all, fields(snippet_count = snippets.len(), workers))]
pub fn run_all(
    snippets: &[Snippet],
    limits: &ExecLimits,
    workers: usize,
) -> Result<Vec<ExecutionResult>> {
    if snippets.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, snippets.len());
    let cursor = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    let results = thread::scope(|scope| -> Result<Vec<ExecutionResult>> {
        for worker_id in 0..workers {
            let tx = tx.clone();
            let cursor = &cursor;
            scope.spawn(move || {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(snippet) = snippets.get(index) else {
                        break;
                    };
                    debug!(worker_id, snippet_id = %snippet.id, "executing snippet");
                    if tx.send(run_snippet(snippet, limits)).is_err() {
                        // Receiver gone: the run is already aborting.
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(snippets.len());
        for result in rx {
            results.push(result.context("execute snippet")?);
        }
        Ok(results)
    })?;

    if results.len() != snippets.len() {
        return Err(anyhow!(
            "expected {} results, got {}",
            snippets.len(),
            results.len()
        ));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use super::*;

    fn limits() -> ExecLimits {
        ExecLimits {
            timeout: Duration::from_secs(5),
            output_limit_bytes: 1024,
            interpreter: vec!["sh".to_string()],
        }
    }

    fn snippet(id: &str) -> Snippet {
        Snippet {
            id: id.to_string(),
            description: String::new(),
            source: format!("echo {}", id),
            expected_output: Some(id.to_string()),
            interpreter: None,
        }
    }

    #[test]
    fn empty_catalog_yields_no_results() {
        let results = run_all(&[], &limits(), 4).expect("run");
        assert!(results.is_empty());
    }

    #[test]
    fn every_snippet_gets_exactly_one_result() {
        let snippets: Vec<Snippet> = (0..10).map(|n| snippet(&format!("s{}", n))).collect();
        let results = run_all(&snippets, &limits(), 4).expect("run");
        assert_eq!(results.len(), snippets.len());

        let ids: BTreeSet<&str> = results.iter().map(|r| r.snippet_id.as_str()).collect();
        assert_eq!(ids.len(), snippets.len());
    }

    #[test]
    fn worker_count_does_not_change_outcomes() {
        let snippets = vec![snippet("a"), snippet("b"), snippet("c"), snippet("d")];

        for workers in [1, 2, 8] {
            let mut results = run_all(&snippets, &limits(), workers).expect("run");
            results.sort_by(|left, right| left.snippet_id.cmp(&right.snippet_id));
            for (result, expected) in results.iter().zip(["a", "b", "c", "d"]) {
                assert_eq!(result.snippet_id, expected);
                assert_eq!(result.actual_output, format!("{}\n", expected));
                assert!(result.error.is_none());
            }
        }
    }

    #[test]
    fn a_timed_out_snippet_does_not_stall_the_pool() {
        let mut slow = snippet("slow");
        slow.source = "sleep 30".to_string();
        slow.expected_output = None;
        let snippets = vec![slow, snippet("fast-1"), snippet("fast-2")];

        let limits = ExecLimits {
            timeout: Duration::from_millis(200),
            output_limit_bytes: 1024,
            interpreter: vec!["sh".to_string()],
        };
        let results = run_all(&snippets, &limits, 2).expect("run");
        assert_eq!(results.len(), 3);
        let failures = results.iter().filter(|r| r.error.is_some()).count();
        assert_eq!(failures, 1);
    }
}
