//! Append-only snippet registry.
//!
//! Holds the catalog in insertion order for one invocation. Registration is
//! atomic: a duplicate id leaves the registry untouched.

use std::collections::HashSet;
use std::fmt;

use crate::catalog::Snippet;

/// Registration-time error: a snippet id was already taken.
///
/// Fatal to startup; per-snippet execution errors never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIdError {
    pub id: String,
}

impl fmt::Display for DuplicateIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate snippet id {:?}", self.id)
    }
}

impl std::error::Error for DuplicateIdError {}

/// Ordered collection of registered snippets with unique ids.
#[derive(Debug, Default)]
pub struct Registry {
    snippets: Vec<Snippet>,
    ids: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from snippets in the given order.
    pub fn from_snippets(snippets: Vec<Snippet>) -> Result<Self, DuplicateIdError> {
        let mut registry = Self::new();
        for snippet in snippets {
            registry.register(snippet)?;
        }
        Ok(registry)
    }

    /// Register a snippet, failing without modification when the id exists.
    pub fn register(&mut self, snippet: Snippet) -> Result<(), DuplicateIdError> {
        if self.ids.contains(&snippet.id) {
            return Err(DuplicateIdError {
                id: snippet.id.clone(),
            });
        }
        self.ids.insert(snippet.id.clone());
        self.snippets.push(snippet);
        Ok(())
    }

    /// Snippets in insertion order. Restartable: call again for a fresh pass.
    pub fn iter(&self) -> std::slice::Iter<'_, Snippet> {
        self.snippets.iter()
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}
