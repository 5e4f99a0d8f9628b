//! Catalog file parsing and validation.
//!
//! Snippets are defined in TOML files, several per file. See `snippets/`
//! for the shipped catalog.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// A parsed catalog file containing one or more snippets.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogFile {
    #[serde(default)]
    pub snippets: Vec<Snippet>,
}

/// A single named, self-contained example unit.
///
/// Immutable once registered. Serialized field names follow the report's
/// JSON contract (camelCase); catalog TOML stays snake_case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Snippet {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Opaque source text piped to the interpreter on stdin.
    pub source: String,
    /// Expected stdout, when the snippet is verifiable.
    pub expected_output: Option<String>,
    /// Interpreter argv override (default: the configured interpreter).
    pub interpreter: Option<Vec<String>>,
}

impl CatalogFile {
    /// Load and validate a catalog file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read catalog {}", path.display()))?;
        let catalog: CatalogFile = toml::from_str(&contents)
            .with_context(|| format!("parse catalog {}", path.display()))?;
        catalog
            .validate()
            .with_context(|| format!("validate catalog {}", path.display()))?;
        Ok(catalog)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let catalog: CatalogFile = toml::from_str(contents).context("parse catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        for (index, snippet) in self.snippets.iter().enumerate() {
            snippet
                .validate()
                .with_context(|| format!("snippets[{}] invalid", index))?;
        }
        Ok(())
    }
}

impl Snippet {
    fn validate(&self) -> Result<()> {
        validate_snippet_id(&self.id)?;
        if self.source.trim().is_empty() {
            bail!("source must be non-empty");
        }
        if let Some(interpreter) = &self.interpreter
            && (interpreter.is_empty() || interpreter[0].trim().is_empty())
        {
            bail!("interpreter must be a non-empty array");
        }
        Ok(())
    }
}

/// Discover and load all snippets from a catalog directory.
///
/// Files are visited in name order so registration order is deterministic;
/// within a file, snippets keep their declaration order. `config.toml` is
/// reserved for harness configuration and skipped.
pub fn load_catalog_dir(dir: &Path) -> Result<Vec<Snippet>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read catalog dir {}", dir.display()))?
    {
        let entry = entry.context("read catalog entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        if path.file_name().and_then(|name| name.to_str()) == Some("config.toml") {
            continue;
        }
        paths.push(path);
    }
    paths.sort();

    let mut snippets = Vec::new();
    for path in paths {
        snippets.extend(CatalogFile::load(&path)?.snippets);
    }
    Ok(snippets)
}

fn validate_snippet_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("id must use [a-z0-9_-] only, got {:?}", id);
    }
    Ok(())
}
