//! Snippet catalog runner CLI.
//!
//! Loads a TOML snippet catalog, executes every snippet in an isolated
//! child process, and reports per-snippet verdicts. The report goes to
//! stdout; diagnostics go to stderr via `RUST_LOG`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::{debug, info};

use harness::catalog::{Snippet, load_catalog_dir};
use harness::config::{apply_cli_overrides, load_config};
use harness::executor::ExecLimits;
use harness::exit_codes;
use harness::logging;
use harness::pool::run_all;
use harness::registry::Registry;
use harness::report::{Report, RunMeta};

#[derive(Parser)]
#[command(
    name = "run-snippets",
    version,
    about = "Run a catalog of example snippets and check their output"
)]
struct Cli {
    /// Directory of snippet catalog TOML files.
    #[arg(long, default_value = "snippets")]
    catalog: PathBuf,

    /// Only run snippets whose id contains this substring.
    #[arg(long)]
    filter: Option<String>,

    /// Per-snippet wall-clock budget in milliseconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Worker thread count (default: available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Report format.
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// List snippet ids and exit without running anything.
    #[arg(long)]
    list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let config = load_config(&cli.catalog.join("config.toml")).context("load config")?;
    let config = apply_cli_overrides(config, cli.timeout, cli.workers)?;

    let snippets = load_catalog_dir(&cli.catalog).context("load catalog")?;
    let registry = Registry::from_snippets(snippets).context("build registry")?;
    debug!(snippet_count = registry.len(), "registry built");

    let selected: Vec<Snippet> = registry
        .iter()
        .filter(|snippet| matches_filter(snippet, cli.filter.as_deref()))
        .cloned()
        .collect();

    if cli.list {
        for snippet in &selected {
            println!("{}", snippet.id);
        }
        return Ok(exit_codes::OK);
    }

    info!(
        snippet_count = selected.len(),
        workers = config.workers,
        timeout_ms = config.timeout_ms,
        "starting run"
    );
    let started_at = Utc::now();
    let limits = ExecLimits::from_config(&config);
    let results = run_all(&selected, &limits, config.workers)?;
    let finished_at = Utc::now();

    let meta = RunMeta {
        started_at,
        finished_at,
        workers: config.workers,
    };
    let report = Report::build(&selected, results, &meta).context("build report")?;

    match cli.format {
        Format::Text => print!("{}", report.render_text()),
        Format::Json => print!("{}", report.to_json()?),
    }

    Ok(if report.has_failures() {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    })
}

fn matches_filter(snippet: &Snippet, filter: Option<&str>) -> bool {
    filter.is_none_or(|needle| snippet.id.contains(needle))
}
