//! Repository tree traversal.

use log::{debug, info, warn};

use crate::config::CrawlRules;
use crate::error::{AuditError, Result};
use crate::inventory::{InventoryBuilder, RepositoryInventory};
use crate::source::{ContentEntry, ContentSource, EntryKind, RepoSlug};

/// Walks a repository through a [`ContentSource`] and builds its inventory.
pub struct Crawler<'a, S: ContentSource + ?Sized> {
    source: &'a S,
    rules: &'a CrawlRules,
}

impl<'a, S: ContentSource + ?Sized> Crawler<'a, S> {
    /// Create a crawler over a content source with the given rules.
    pub fn new(source: &'a S, rules: &'a CrawlRules) -> Self {
        Self { source, rules }
    }

    /// Crawl the whole repository.
    ///
    /// Only a failure to list the root aborts the crawl; every other failure
    /// is recorded in [`RepositoryInventory::inaccessible`].
    pub async fn crawl(&self, slug: &RepoSlug) -> Result<RepositoryInventory> {
        let root = self
            .source
            .list_directory("")
            .await
            .map_err(|err| match err {
                AuditError::NotFound(_) | AuditError::RepositoryNotFound { .. } => {
                    AuditError::RepositoryNotFound {
                        owner: slug.owner.clone(),
                        repo: slug.repo.clone(),
                    }
                }
                other => other,
            })?;

        let mut builder = InventoryBuilder::new();
        let mut pending: Vec<ContentEntry> = Vec::new();
        push_children(&mut pending, "", root);

        while let Some(entry) = pending.pop() {
            match entry.kind {
                EntryKind::Dir => self.visit_directory(&mut builder, &mut pending, entry).await,
                EntryKind::File => self.visit_file(&mut builder, entry).await,
                EntryKind::Other => debug!("ignoring {} (not a file or directory)", entry.path),
            }
        }

        let inventory = builder.finish();
        info!(
            "crawled {slug}: {} files, {} directories, {} fetched, {} inaccessible",
            inventory.file_paths.len(),
            inventory.directory_paths.len(),
            inventory.file_contents.len(),
            inventory.inaccessible.len()
        );
        Ok(inventory)
    }

    async fn visit_directory(
        &self,
        builder: &mut InventoryBuilder,
        pending: &mut Vec<ContentEntry>,
        entry: ContentEntry,
    ) {
        if self.rules.skips_path(&entry.path) {
            debug!("skipping directory {}", entry.path);
            return;
        }
        builder.record_directory(&entry.path);

        if depth(&entry.path) > self.rules.max_depth {
            builder.record_inaccessible(&entry.path, "depth limit");
            return;
        }

        match self.source.list_directory(&entry.path).await {
            Ok(children) => push_children(pending, &entry.path, children),
            Err(err) => {
                warn!("failed to list {}: {err}", entry.path);
                builder.record_inaccessible(&entry.path, err.to_string());
            }
        }
    }

    async fn visit_file(&self, builder: &mut InventoryBuilder, entry: ContentEntry) {
        if self.rules.skips_file(&entry.path, entry.size) {
            debug!("skipping file {} ({} bytes)", entry.path, entry.size);
            return;
        }
        builder.record_file(&entry.path, entry.size);

        if !self.rules.is_important(&entry.path)
            || builder.content_count() >= self.rules.max_content_files
        {
            return;
        }

        match self.source.read_file(&entry.path).await {
            Ok(content) if content.len() as u64 > self.rules.max_file_size => {
                debug!("discarding oversized content of {}", entry.path);
            }
            Ok(content) => {
                builder.record_content(&entry.path, content);
            }
            Err(err) => {
                warn!("failed to read {}: {err}", entry.path);
                builder.record_inaccessible(&entry.path, err.to_string());
            }
        }
    }
}

/// Queue children so they pop in listing order, normalising their paths.
fn push_children(pending: &mut Vec<ContentEntry>, parent: &str, children: Vec<ContentEntry>) {
    for mut child in children.into_iter().rev() {
        child.path = normalize_path(parent, &child);
        if child.path.is_empty() {
            continue;
        }
        pending.push(child);
    }
}

fn normalize_path(parent: &str, entry: &ContentEntry) -> String {
    let path = entry.path.trim_matches('/');
    if !path.is_empty() {
        return path.to_string();
    }
    let name = entry.name.trim_matches('/');
    if parent.is_empty() || name.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::Crawler;
    use crate::config::CrawlRules;
    use crate::error::AuditError;
    use crate::source::{ContentEntry, EntryKind, MockContentSource, RepoSlug};

    fn slug() -> RepoSlug {
        RepoSlug::new("octo", "demo").expect("slug")
    }

    fn listing(path: &str) -> crate::error::Result<Vec<ContentEntry>> {
        match path {
            "" => Ok(vec![
                ContentEntry::file("README.md", 120),
                ContentEntry::dir("src"),
                ContentEntry::dir("project"),
                ContentEntry::file("logo.png", 4_000),
                ContentEntry::file("bundle.zip", 10),
                ContentEntry::file("huge.rs", 2_000_000),
                ContentEntry::dir("broken"),
            ]),
            "src" => Ok(vec![
                ContentEntry::file("src/main.rs", 40),
                ContentEntry::dir("src/utils"),
            ]),
            "src/utils" => Ok(vec![ContentEntry::file("src/utils/mod.rs", 20)]),
            "project" => Ok(vec![
                ContentEntry::dir("project/node_modules"),
                ContentEntry::dir("project/node_modules.old"),
                ContentEntry::file("project/package.json", 30),
            ]),
            "project/node_modules.old" => {
                Ok(vec![ContentEntry::file("project/node_modules.old/index.js", 10)])
            }
            "project/node_modules" => Ok(vec![ContentEntry::dir("project/node_modules/pkg")]),
            "project/node_modules/pkg" => {
                Ok(vec![ContentEntry::file("project/node_modules/pkg/index.js", 10)])
            }
            "broken" => Err(AuditError::RateLimited("slow down".to_string())),
            other => Err(AuditError::NotFound(other.to_string())),
        }
    }

    fn tree_source() -> MockContentSource {
        let mut source = MockContentSource::new();
        source
            .expect_list_directory()
            .returning(|path| listing(path));
        source.expect_read_file().returning(|path| match path {
            "src/utils/mod.rs" => Err(AuditError::Decode("invalid utf-8".to_string())),
            other => Ok(format!("contents of {other}")),
        });
        source
    }

    #[tokio::test]
    async fn crawl_records_tree_and_contents() {
        let source = tree_source();
        let rules = CrawlRules::default();
        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");

        assert!(inventory.has_file("README.md"));
        assert!(inventory.has_file("src/main.rs"));
        assert!(inventory.has_file("src/utils/mod.rs"));
        assert!(inventory.has_file("project/package.json"));
        assert!(inventory.has_file("logo.png"));
        assert_eq!(inventory.content("README.md"), Some("contents of README.md"));
        assert_eq!(
            inventory.content("src/main.rs"),
            Some("contents of src/main.rs")
        );
        assert_eq!(inventory.content("logo.png"), None);
        assert!(inventory.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn crawl_excludes_skipped_directories_and_files() {
        let source = tree_source();
        let rules = CrawlRules::default();
        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");

        assert!(!inventory.has_directory("project/node_modules"));
        assert!(!inventory.has_directory("project/node_modules/pkg"));
        assert!(
            inventory
                .file_paths
                .iter()
                .all(|path| !path.starts_with("project/node_modules"))
        );
        assert!(!inventory.has_file("huge.rs"));
        assert!(!inventory.has_file("bundle.zip"));

        assert!(!inventory.has_directory("project/node_modules.old"));
        for path in inventory
            .file_paths
            .iter()
            .chain(inventory.directory_paths.iter())
        {
            let wrapped = format!("/{}/", path.to_lowercase());
            for skip in &rules.skip_directories {
                assert!(!wrapped.contains(skip.as_str()), "{path} matches {skip}");
            }
        }
        for path in &inventory.file_paths {
            let size = inventory.file_sizes[path];
            assert!(!rules.skips_file(path, size), "{path} should be skipped");
        }
    }

    #[tokio::test]
    async fn crawl_records_partial_failures_and_continues() {
        let source = tree_source();
        let rules = CrawlRules::default();
        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");

        let failed: Vec<&str> = inventory
            .inaccessible
            .iter()
            .map(|entry| entry.path.as_str())
            .collect();
        assert_eq!(failed, vec!["src/utils/mod.rs", "broken"]);
        assert!(inventory.has_directory("broken"));
        assert!(inventory.has_file("src/utils/mod.rs"));
        assert_eq!(inventory.content("src/utils/mod.rs"), None);
    }

    #[tokio::test]
    async fn crawl_visits_parents_before_children_in_listing_order() {
        let source = tree_source();
        let rules = CrawlRules::default();
        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");

        assert_eq!(
            inventory.traversal_order,
            vec![
                "README.md",
                "src",
                "src/main.rs",
                "src/utils",
                "src/utils/mod.rs",
                "project",
                "project/package.json",
                "logo.png",
                "broken",
            ]
        );
    }

    #[tokio::test]
    async fn crawl_is_reproducible() {
        let rules = CrawlRules::default();
        let first_source = tree_source();
        let second_source = tree_source();
        let first = Crawler::new(&first_source, &rules)
            .crawl(&slug())
            .await
            .expect("first crawl");
        let second = Crawler::new(&second_source, &rules)
            .crawl(&slug())
            .await
            .expect("second crawl");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_root_is_fatal_and_distinct() {
        let mut source = MockContentSource::new();
        source
            .expect_list_directory()
            .returning(|_| Err(AuditError::NotFound(String::new())));
        let rules = CrawlRules::default();

        let err = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .unwrap_err();
        match err {
            AuditError::RepositoryNotFound { owner, repo } => {
                assert_eq!(owner, "octo");
                assert_eq!(repo, "demo");
            }
            other => panic!("expected RepositoryNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_root_failures_propagate_unchanged() {
        let mut source = MockContentSource::new();
        source
            .expect_list_directory()
            .returning(|_| Err(AuditError::RateLimited("quota".to_string())));
        let rules = CrawlRules::default();

        let err = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::RateLimited(_)));
    }

    #[tokio::test]
    async fn content_fetch_stops_at_the_configured_bound() {
        let mut source = MockContentSource::new();
        source.expect_list_directory().returning(|_| {
            Ok((0..5)
                .map(|index| ContentEntry::file(format!("file{index}.py"), 10))
                .collect())
        });
        source
            .expect_read_file()
            .times(2)
            .returning(|_| Ok("print('hi')".to_string()));
        let rules = CrawlRules {
            max_content_files: 2,
            ..CrawlRules::default()
        };

        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");
        assert_eq!(inventory.file_paths.len(), 5);
        assert_eq!(inventory.file_contents.len(), 2);
    }

    #[tokio::test]
    async fn deep_directories_are_recorded_but_not_listed() {
        let mut source = MockContentSource::new();
        source.expect_list_directory().returning(|path| match path {
            "" => Ok(vec![ContentEntry::dir("a")]),
            "a" => Ok(vec![ContentEntry::dir("a/b")]),
            other => panic!("unexpected listing of {other}"),
        });
        let rules = CrawlRules {
            max_depth: 1,
            ..CrawlRules::default()
        };

        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");
        assert!(inventory.has_directory("a/b"));
        assert_eq!(inventory.inaccessible[0].reason, "depth limit");
    }

    #[tokio::test]
    async fn entries_without_paths_are_joined_to_their_parent() {
        let mut source = MockContentSource::new();
        source.expect_list_directory().returning(|path| match path {
            "" => Ok(vec![ContentEntry {
                name: "lib".to_string(),
                path: String::new(),
                kind: EntryKind::Dir,
                size: 0,
            }]),
            "lib" => Ok(vec![ContentEntry {
                name: "core.rb".to_string(),
                path: String::new(),
                kind: EntryKind::File,
                size: 8,
            }]),
            other => panic!("unexpected listing of {other}"),
        });
        source
            .expect_read_file()
            .returning(|_| Ok("module Core; end".to_string()));
        let rules = CrawlRules::default();

        let inventory = Crawler::new(&source, &rules)
            .crawl(&slug())
            .await
            .expect("crawl succeeds");
        assert!(inventory.has_file("lib/core.rb"));
    }
}
