//! Content and metadata abstractions over a repository host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// An `owner/repository` pair on the hosting provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug {
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl RepoSlug {
    /// Build a slug from separate owner and repository names.
    pub fn new(owner: &str, repo: &str) -> Result<Self> {
        let owner = owner.trim();
        let repo = repo.trim().trim_end_matches(".git");
        if owner.is_empty() || repo.is_empty() {
            return Err(AuditError::Config(
                "owner and repository are required".to_string(),
            ));
        }
        if owner.contains('/') || repo.contains('/') {
            return Err(AuditError::Config(format!(
                "invalid repository slug: {owner}/{repo}"
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Parse `owner/repo` or a GitHub URL (https or ssh form).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/').trim_end_matches(".git");
        let rest = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("git@github.com:"))
            .or_else(|| trimmed.strip_prefix("github.com/"))
            .unwrap_or(trimmed);
        if rest.contains("://") {
            return Err(AuditError::Config(format!(
                "unsupported repository url: {input}"
            )));
        }
        let mut parts = rest.split('/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();
        Self::new(owner, repo)
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Kind of a directory listing entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Dir,
    /// Symlinks, submodules, and anything else the crawler ignores.
    Other,
}

/// A single entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Base name of the entry.
    pub name: String,
    /// Slash-delimited path relative to the repository root.
    pub path: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes (zero for directories).
    pub size: u64,
}

impl ContentEntry {
    /// Build a file entry, deriving the name from the path.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        Self {
            name: base_name(&path).to_string(),
            path,
            kind: EntryKind::File,
            size,
        }
    }

    /// Build a directory entry, deriving the name from the path.
    pub fn dir(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: base_name(&path).to_string(),
            path,
            kind: EntryKind::Dir,
            size: 0,
        }
    }
}

/// Repository level metadata reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetadata {
    /// `owner/name` as reported by the host.
    pub full_name: String,
    /// Short description.
    pub description: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: Option<String>,
    /// Last push timestamp (RFC 3339).
    pub pushed_at: Option<String>,
    /// Whether the repository is a fork.
    pub fork: bool,
    /// Star count.
    pub stargazers_count: u64,
    /// Fork count.
    pub forks_count: u64,
    /// Repository topics.
    pub topics: Vec<String>,
    /// Project homepage.
    pub homepage: Option<String>,
    /// SPDX identifier of the detected license.
    pub license: Option<String>,
    /// Default branch name.
    pub default_branch: Option<String>,
    /// Primary language reported by the host.
    pub language: Option<String>,
}

/// Read access to repository contents, keyed by path.
///
/// The root of the repository is addressed by the empty path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List the entries of a directory.
    async fn list_directory(&self, path: &str) -> Result<Vec<ContentEntry>>;
    /// Read a file as decoded text.
    async fn read_file(&self, path: &str) -> Result<String>;
}

/// Read access to repository metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch repository metadata.
    async fn repository(&self) -> Result<RepoMetadata>;
    /// Count the repository contributors.
    async fn contributor_count(&self) -> Result<usize>;
}

/// Last segment of a slash-delimited path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lowercased extension of a slash-delimited path, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = base_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Every ancestor directory of a path, outermost first.
pub fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .map(|(index, _)| &path[..index])
        .filter(|ancestor| !ancestor.is_empty())
        .collect()
}
