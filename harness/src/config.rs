//! Harness configuration stored as `<catalog>/config.toml`.

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Run configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; CLI flags take
/// precedence over the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Per-snippet wall-clock budget in milliseconds.
    pub timeout_ms: u64,

    /// Worker thread count. Defaults to available parallelism.
    pub workers: usize,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Interpreter argv; snippet source is piped on stdin.
    pub interpreter: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            workers: default_workers(),
            output_limit_bytes: 100_000,
            interpreter: vec!["sh".to_string()],
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be > 0"));
        }
        if self.workers == 0 {
            return Err(anyhow!("workers must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.interpreter.is_empty() || self.interpreter[0].trim().is_empty() {
            return Err(anyhow!("interpreter must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        let cfg = RunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply CLI flag overrides to the base config.
pub fn apply_cli_overrides(
    mut base: RunConfig,
    timeout_ms: Option<u64>,
    workers: Option<usize>,
) -> Result<RunConfig> {
    if let Some(timeout_ms) = timeout_ms {
        base.timeout_ms = timeout_ms;
    }
    if let Some(workers) = workers {
        base.workers = workers;
    }
    base.validate()?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "timeout_ms = 250\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.timeout_ms, 250);
        assert_eq!(cfg.interpreter, vec!["sh".to_string()]);
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "timeout_ms = 0\n").expect("write");
        let _err = load_config(&path).expect_err("invalid config");
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let cfg = apply_cli_overrides(RunConfig::default(), Some(1_000), Some(2)).expect("merge");
        assert_eq!(cfg.timeout_ms, 1_000);
        assert_eq!(cfg.workers, 2);
    }

    #[test]
    fn cli_overrides_are_validated() {
        let _err =
            apply_cli_overrides(RunConfig::default(), Some(0), None).expect_err("zero timeout");
    }
}
