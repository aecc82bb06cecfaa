//! Repository inventory produced by a crawl.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::source::ancestors;

/// A path that could not be listed or read during a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InaccessiblePath {
    /// Repository-relative path.
    pub path: String,
    /// Why the path was not recorded or read.
    pub reason: String,
}

/// Flat record of every discovered path and the fetched file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInventory {
    /// Every recorded file path.
    pub file_paths: BTreeSet<String>,
    /// Every recorded directory path.
    pub directory_paths: BTreeSet<String>,
    /// Decoded text for the fetched subset of `file_paths`.
    #[serde(skip)]
    pub file_contents: BTreeMap<String, String>,
    /// Reported size of each recorded file.
    pub file_sizes: BTreeMap<String, u64>,
    /// Recorded paths in visit order.
    pub traversal_order: Vec<String>,
    /// Paths that failed to list or read.
    pub inaccessible: Vec<InaccessiblePath>,
}

impl RepositoryInventory {
    /// Whether a file exists at exactly this path.
    pub fn has_file(&self, path: &str) -> bool {
        self.file_paths.contains(path)
    }

    /// Whether a directory exists at exactly this path.
    pub fn has_directory(&self, path: &str) -> bool {
        self.directory_paths.contains(path)
    }

    /// Fetched content of a file, if it was retained.
    pub fn content(&self, path: &str) -> Option<&str> {
        self.file_contents.get(path).map(String::as_str)
    }

    /// Iterate over `(path, content)` pairs of fetched files.
    pub fn contents(&self) -> impl Iterator<Item = (&str, &str)> {
        self.file_contents
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    /// Path and content of the project README, preferring the root one.
    pub fn readme(&self) -> Option<(&str, &str)> {
        let is_readme = |path: &str| {
            let name = crate::source::base_name(path).to_lowercase();
            name == "readme" || name.starts_with("readme.")
        };
        self.contents()
            .filter(|(path, _)| is_readme(path))
            .min_by_key(|(path, _)| (path.matches('/').count(), *path))
    }

    /// Verify the containment and parent-closure invariants.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if let Some(orphan) = self
            .file_contents
            .keys()
            .find(|path| !self.file_paths.contains(*path))
        {
            return Err(format!("content recorded for unknown file {orphan}"));
        }
        for path in self.file_paths.iter().chain(self.directory_paths.iter()) {
            if let Some(parent) = ancestors(path)
                .into_iter()
                .find(|parent| !self.directory_paths.contains(*parent))
            {
                return Err(format!("{path} is missing parent directory {parent}"));
            }
        }
        Ok(())
    }
}

/// Single-writer accumulator for one crawl.
///
/// Parents are filled in as paths are recorded so the parent-closure invariant
/// holds regardless of visit order.
#[derive(Debug, Default)]
pub struct InventoryBuilder {
    inventory: RepositoryInventory,
}

impl InventoryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory and any missing ancestors.
    pub fn record_directory(&mut self, path: &str) {
        self.record_ancestors(path);
        self.insert_directory(path);
    }

    /// Record a file, its size, and any missing ancestors.
    pub fn record_file(&mut self, path: &str, size: u64) {
        self.record_ancestors(path);
        if self.inventory.file_paths.insert(path.to_string()) {
            self.inventory.traversal_order.push(path.to_string());
        }
        self.inventory.file_sizes.insert(path.to_string(), size);
    }

    /// Attach fetched content to a previously recorded file.
    ///
    /// Content for unknown paths is ignored.
    pub fn record_content(&mut self, path: &str, content: String) -> bool {
        if !self.inventory.file_paths.contains(path) {
            return false;
        }
        self.inventory
            .file_contents
            .insert(path.to_string(), content);
        true
    }

    /// Record a path that could not be listed or read.
    pub fn record_inaccessible(&mut self, path: &str, reason: impl Into<String>) {
        self.inventory.inaccessible.push(InaccessiblePath {
            path: path.to_string(),
            reason: reason.into(),
        });
    }

    /// Number of files whose content has been retained.
    pub fn content_count(&self) -> usize {
        self.inventory.file_contents.len()
    }

    /// Finish the crawl and hand out the immutable inventory.
    pub fn finish(self) -> RepositoryInventory {
        self.inventory
    }

    fn record_ancestors(&mut self, path: &str) {
        for ancestor in ancestors(path) {
            self.insert_directory(ancestor);
        }
    }

    fn insert_directory(&mut self, path: &str) {
        if self.inventory.directory_paths.insert(path.to_string()) {
            self.inventory.traversal_order.push(path.to_string());
        }
    }
}

/// Build an inventory from `(path, content)` pairs; empty content means "not fetched".
#[cfg(test)]
pub(crate) fn fixture(files: &[(&str, &str)]) -> RepositoryInventory {
    let mut builder = InventoryBuilder::new();
    for (path, content) in files {
        builder.record_file(path, content.len() as u64);
        if !content.is_empty() {
            builder.record_content(path, content.to_string());
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::{InventoryBuilder, RepositoryInventory};

    #[test]
    fn builder_fills_missing_parents() {
        let mut builder = InventoryBuilder::new();
        builder.record_file("src/app/main.rs", 10);
        let inventory = builder.finish();

        assert!(inventory.has_directory("src"));
        assert!(inventory.has_directory("src/app"));
        assert_eq!(
            inventory.traversal_order,
            vec!["src", "src/app", "src/app/main.rs"]
        );
        assert!(inventory.check_invariants().is_ok());
    }

    #[test]
    fn content_for_unknown_file_is_rejected() {
        let mut builder = InventoryBuilder::new();
        builder.record_file("README.md", 5);
        assert!(builder.record_content("README.md", "hello".to_string()));
        assert!(!builder.record_content("ghost.md", "boo".to_string()));

        let inventory = builder.finish();
        assert_eq!(inventory.content("README.md"), Some("hello"));
        assert_eq!(inventory.content("ghost.md"), None);
        assert!(inventory.check_invariants().is_ok());
    }

    #[test]
    fn invariant_check_flags_orphans() {
        let mut inventory = RepositoryInventory::default();
        inventory.file_paths.insert("a/b.txt".to_string());
        assert!(inventory.check_invariants().is_err());

        inventory.directory_paths.insert("a".to_string());
        assert!(inventory.check_invariants().is_ok());

        inventory
            .file_contents
            .insert("c.txt".to_string(), String::new());
        assert!(inventory.check_invariants().is_err());
    }

    #[test]
    fn readme_prefers_the_root_file() {
        let inventory = super::fixture(&[
            ("docs/README.md", "nested"),
            ("Readme.rst", "root"),
            ("src/lib.rs", "fn x() {}"),
        ]);
        assert_eq!(inventory.readme(), Some(("Readme.rst", "root")));
        assert_eq!(RepositoryInventory::default().readme(), None);
    }

    #[test]
    fn repeated_records_do_not_duplicate_order() {
        let mut builder = InventoryBuilder::new();
        builder.record_directory("docs");
        builder.record_directory("docs");
        builder.record_file("docs/a.md", 1);
        builder.record_file("docs/a.md", 1);
        let inventory = builder.finish();
        assert_eq!(inventory.traversal_order, vec!["docs", "docs/a.md"]);
    }
}
