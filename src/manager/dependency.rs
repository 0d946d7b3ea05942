//! File → root-input dependency graph for incremental rebuilds.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Maps every touched file to the root inputs whose bundle read it.
///
/// Uses BTreeMap/BTreeSet so every query answers in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every edge.
    pub fn clear(&mut self) {
        self.dependents.clear();
    }

    /// Replace the whole graph from `(root, touched files)` pairs.
    pub fn rebuild<I>(&mut self, roots: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        self.clear();
        for (root, files) in roots {
            self.replace_root(&root, &files);
        }
    }

    /// Patch the edges of one root: forget what it touched before, then
    /// record `files`.
    pub fn replace_root(&mut self, root: &str, files: &[String]) {
        self.remove_root(root);
        for file in files {
            self.dependents
                .entry(file.clone())
                .or_default()
                .insert(root.to_string());
        }
    }

    /// Remove every edge pointing at `root`.
    pub fn remove_root(&mut self, root: &str) {
        self.dependents.retain(|_, roots| {
            roots.remove(root);
            !roots.is_empty()
        });
    }

    /// Root inputs that read `file`, sorted.
    pub fn dependents(&self, file: &str) -> Vec<String> {
        self.dependents
            .get(file)
            .map(|roots| roots.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any root read `file`.
    pub fn contains(&self, file: &str) -> bool {
        self.dependents.contains_key(file)
    }

    /// Every tracked file, sorted.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.dependents.keys().map(String::as_str)
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    /// Whether no file is tracked.
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}
