//! Report construction and rendering.
//!
//! Totals are order-independent: results may arrive in any order from the
//! worker pool, and rows are re-sequenced into registry insertion order.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Snippet;
use crate::executor::ExecutionResult;
use crate::verdict::{Verdict, evaluate};

/// One snippet's row in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnippetReport {
    pub snippet: Snippet,
    pub result: ExecutionResult,
    pub verdict: Verdict,
}

/// Timing and sizing metadata for one invocation.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workers: usize,
}

/// Aggregated results of one full run of the catalog.
///
/// `skipped_count` is the `Unverified` tally; the JSON field names form the
/// external contract. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_count: usize,
    pub pass_count: usize,
    pub fail_count: usize,
    pub skipped_count: usize,
    pub started_at: String,
    pub finished_at: String,
    pub workers: usize,
    pub per_snippet: Vec<SnippetReport>,
}

impl Report {
    /// Build a report from results in arrival order.
    ///
    /// Every snippet must have exactly one result; anything else is an
    /// aggregation bug and errors out.
    pub fn build(
        snippets: &[Snippet],
        results: Vec<ExecutionResult>,
        meta: &RunMeta,
    ) -> Result<Self> {
        let mut by_id: HashMap<String, ExecutionResult> = HashMap::with_capacity(results.len());
        for result in results {
            if by_id.insert(result.snippet_id.clone(), result).is_some() {
                return Err(anyhow!("multiple results for one snippet"));
            }
        }

        let mut per_snippet = Vec::with_capacity(snippets.len());
        let mut pass_count = 0;
        let mut fail_count = 0;
        let mut skipped_count = 0;
        for snippet in snippets {
            let result = by_id
                .remove(&snippet.id)
                .with_context(|| format!("missing result for snippet {}", snippet.id))?;
            let verdict = evaluate(snippet, &result);
            match verdict {
                Verdict::Pass => pass_count += 1,
                Verdict::Fail => fail_count += 1,
                Verdict::Unverified => skipped_count += 1,
            }
            per_snippet.push(SnippetReport {
                snippet: snippet.clone(),
                result,
                verdict,
            });
        }
        if let Some(id) = by_id.keys().next() {
            return Err(anyhow!("result for unknown snippet {}", id));
        }

        Ok(Self {
            total_count: snippets.len(),
            pass_count,
            fail_count,
            skipped_count,
            started_at: meta.started_at.to_rfc3339(),
            finished_at: meta.finished_at.to_rfc3339(),
            workers: meta.workers,
            per_snippet,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.fail_count > 0
    }

    /// One line per snippet plus a summary line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for row in &self.per_snippet {
            out.push_str(&format!(
                "{}: {} ({}ms)\n",
                row.snippet.id,
                row.verdict.label(),
                row.result.duration_ms
            ));
        }
        out.push_str(&format!(
            "total={} pass={} fail={} unverified={}\n",
            self.total_count, self.pass_count, self.fail_count, self.skipped_count
        ));
        out
    }

    /// Pretty-printed JSON with trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut payload = serde_json::to_string_pretty(self).context("serialize report")?;
        payload.push('\n');
        Ok(payload)
    }
}
