//! GitHub REST implementation of the content and metadata sources.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::config::GitHubSettings;
use crate::error::{AuditError, Result};
use crate::source::{
    ContentEntry, ContentSource, EntryKind, MetadataSource, RepoMetadata, RepoSlug,
};

const CONTRIBUTORS_PAGE_SIZE: usize = 100;
const MAX_CONTRIBUTOR_PAGES: usize = 10;

/// GitHub API client bound to one repository.
#[derive(Clone)]
pub struct GitHubClient {
    base_url: String,
    token: Option<String>,
    user_agent: String,
    slug: RepoSlug,
    client: Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .field("slug", &self.slug)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiContents {
    Listing(Vec<ApiEntry>),
    File(ApiFile),
}

#[derive(Debug, Deserialize)]
struct ApiLicense {
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    full_name: String,
    description: Option<String>,
    created_at: Option<String>,
    pushed_at: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    homepage: Option<String>,
    license: Option<ApiLicense>,
    default_branch: Option<String>,
    language: Option<String>,
}

impl From<ApiRepository> for RepoMetadata {
    fn from(repo: ApiRepository) -> Self {
        Self {
            full_name: repo.full_name,
            description: repo.description,
            created_at: repo.created_at,
            pushed_at: repo.pushed_at,
            fork: repo.fork,
            stargazers_count: repo.stargazers_count,
            forks_count: repo.forks_count,
            topics: repo.topics,
            homepage: repo.homepage,
            license: repo.license.and_then(|license| license.spdx_id),
            default_branch: repo.default_branch,
            language: repo.language,
        }
    }
}

impl GitHubClient {
    /// Build a client for one repository.
    pub fn new(settings: &GitHubSettings, slug: RepoSlug) -> Self {
        Self {
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            user_agent: settings.user_agent.clone(),
            slug,
            client: Client::new(),
        }
    }

    /// Repository this client reads from.
    pub fn slug(&self) -> &RepoSlug {
        &self.slug
    }

    fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.base_url,
            urlencoding::encode(&self.slug.owner),
            urlencoding::encode(&self.slug.repo)
        )
    }

    fn contents_url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return format!("{}/contents", self.repo_url());
        }
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/contents/{}", self.repo_url(), encoded.join("/"))
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, url: &str, context: &str) -> Result<Response> {
        debug!("GET {url}");
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|err| AuditError::Network(format!("{context}: {err}")))?;
        check_status(response, context).await
    }

    async fn contents(&self, path: &str) -> Result<ApiContents> {
        let context = if path.is_empty() { "/" } else { path };
        let response = self.send(&self.contents_url(path), context).await?;
        response
            .json::<ApiContents>()
            .await
            .map_err(|err| AuditError::Decode(format!("{context}: {err}")))
    }
}

async fn check_status(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AuditError::NotFound(context.to_string()));
    }
    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == "0");
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && quota_exhausted)
    {
        return Err(AuditError::RateLimited(format!("{context}: {body}")));
    }
    Err(AuditError::Http {
        status: status.as_u16(),
        message: format!("{context}: {body}"),
    })
}

fn decode_content(path: &str, file: ApiFile) -> Result<String> {
    let encoding = file.encoding.as_deref().unwrap_or("base64");
    let content = file.content.unwrap_or_default();
    if encoding != "base64" {
        return Err(AuditError::Decode(format!(
            "{path}: unsupported content encoding '{encoding}'"
        )));
    }
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|err| AuditError::Decode(format!("{path}: {err}")))?;
    String::from_utf8(bytes).map_err(|err| AuditError::Decode(format!("{path}: {err}")))
}

#[async_trait]
impl ContentSource for GitHubClient {
    async fn list_directory(&self, path: &str) -> Result<Vec<ContentEntry>> {
        match self.contents(path).await? {
            ApiContents::Listing(entries) => Ok(entries
                .into_iter()
                .map(|entry| ContentEntry {
                    kind: match entry.kind.as_str() {
                        "file" => EntryKind::File,
                        "dir" => EntryKind::Dir,
                        _ => EntryKind::Other,
                    },
                    name: entry.name,
                    path: entry.path,
                    size: entry.size,
                })
                .collect()),
            ApiContents::File(_) => Err(AuditError::Decode(format!("{path}: not a directory"))),
        }
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        match self.contents(path).await? {
            ApiContents::File(file) => decode_content(path, file),
            ApiContents::Listing(_) => Err(AuditError::Decode(format!("{path}: not a file"))),
        }
    }
}

#[async_trait]
impl MetadataSource for GitHubClient {
    async fn repository(&self) -> Result<RepoMetadata> {
        let context = self.slug.to_string();
        let response = self.send(&self.repo_url(), &context).await?;
        let repo: ApiRepository = response
            .json()
            .await
            .map_err(|err| AuditError::Decode(format!("{context}: {err}")))?;
        Ok(repo.into())
    }

    async fn contributor_count(&self) -> Result<usize> {
        let mut total = 0;
        for page in 1..=MAX_CONTRIBUTOR_PAGES {
            let url = format!(
                "{}/contributors?per_page={CONTRIBUTORS_PAGE_SIZE}&anon=1&page={page}",
                self.repo_url()
            );
            let response = self.send(&url, "contributors").await?;
            if response.status() == StatusCode::NO_CONTENT {
                break;
            }
            let contributors: Vec<serde_json::Value> = response
                .json()
                .await
                .map_err(|err| AuditError::Decode(format!("contributors: {err}")))?;
            total += contributors.len();
            if contributors.len() < CONTRIBUTORS_PAGE_SIZE {
                break;
            }
            if page == MAX_CONTRIBUTOR_PAGES {
                warn!(
                    "contributor count for {} truncated at {total} after {page} pages",
                    self.slug
                );
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, token: Option<&str>) -> GitHubClient {
        let settings = GitHubSettings {
            api_url: server.url(""),
            token: token.map(str::to_string),
            user_agent: "repograde-test".to_string(),
        };
        GitHubClient::new(&settings, RepoSlug::new("octo", "demo").expect("slug"))
    }

    #[tokio::test]
    async fn lists_directory_entries_with_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/octo/demo/contents")
                    .header("user-agent", "repograde-test")
                    .header("authorization", "Bearer secret")
                    .header("accept", "application/vnd.github+json");
                then.status(200).json_body(json!([
                    {"name": "src", "path": "src", "type": "dir", "size": 0},
                    {"name": "README.md", "path": "README.md", "type": "file", "size": 42},
                    {"name": "vendor", "path": "vendor", "type": "submodule", "size": 0}
                ]));
            })
            .await;

        let entries = client(&server, Some("secret"))
            .list_directory("")
            .await
            .expect("listing");
        mock.assert_async().await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ContentEntry::dir("src"));
        assert_eq!(entries[1], ContentEntry::file("README.md", 42));
        assert_eq!(entries[2].kind, EntryKind::Other);
    }

    #[tokio::test]
    async fn reads_base64_file_with_line_breaks() {
        let server = MockServer::start_async().await;
        let encoded = STANDARD.encode("fn main() {\n    println!(\"hi\");\n}\n");
        let (head, tail) = encoded.split_at(10);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contents/src/main.rs");
                then.status(200).json_body(json!({
                    "type": "file",
                    "encoding": "base64",
                    "content": format!("{head}\n{tail}\n")
                }));
            })
            .await;

        let content = client(&server, None)
            .read_file("src/main.rs")
            .await
            .expect("file");
        assert!(content.contains("println!"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let server = MockServer::start_async().await;
        let encoded = STANDARD.encode([0xff_u8, 0xfe, 0x00]);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contents/blob.txt");
                then.status(200)
                    .json_body(json!({"encoding": "base64", "content": encoded}));
            })
            .await;

        let err = client(&server, None).read_file("blob.txt").await.unwrap_err();
        assert!(matches!(err, AuditError::Decode(_)));
    }

    #[tokio::test]
    async fn maps_missing_paths_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contents/missing");
                then.status(404).json_body(json!({"message": "Not Found"}));
            })
            .await;

        let err = client(&server, None)
            .list_directory("missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn distinguishes_rate_limits_from_other_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contents/limited");
                then.status(403)
                    .header("x-ratelimit-remaining", "0")
                    .body("API rate limit exceeded");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contents/forbidden");
                then.status(403).body("Resource not accessible");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contents/broken");
                then.status(502).body("bad gateway");
            })
            .await;

        let github = client(&server, None);
        assert!(matches!(
            github.list_directory("limited").await,
            Err(AuditError::RateLimited(_))
        ));
        assert!(matches!(
            github.list_directory("forbidden").await,
            Err(AuditError::Http { status: 403, .. })
        ));
        assert!(matches!(
            github.list_directory("broken").await,
            Err(AuditError::Http { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let settings = GitHubSettings {
            api_url: "http://127.0.0.1:1".to_string(),
            ..GitHubSettings::default()
        };
        let github = GitHubClient::new(&settings, RepoSlug::new("octo", "demo").expect("slug"));
        let err = github.list_directory("").await.unwrap_err();
        assert!(matches!(err, AuditError::Network(_)));
    }

    #[tokio::test]
    async fn fetches_repository_metadata() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo");
                then.status(200).json_body(json!({
                    "full_name": "octo/demo",
                    "description": "Demo project",
                    "created_at": "2025-07-02T10:00:00Z",
                    "pushed_at": "2025-07-06T18:00:00Z",
                    "fork": true,
                    "stargazers_count": 12,
                    "forks_count": 3,
                    "topics": ["hackathon", "ai"],
                    "homepage": "https://demo.example.com",
                    "license": {"key": "mit", "spdx_id": "MIT"},
                    "default_branch": "main",
                    "language": "Rust"
                }));
            })
            .await;

        let metadata = client(&server, None).repository().await.expect("metadata");
        assert_eq!(metadata.full_name, "octo/demo");
        assert!(metadata.fork);
        assert_eq!(metadata.stargazers_count, 12);
        assert_eq!(metadata.license.as_deref(), Some("MIT"));
        assert_eq!(metadata.topics, vec!["hackathon", "ai"]);
        assert_eq!(metadata.created_at.as_deref(), Some("2025-07-02T10:00:00Z"));
    }

    #[tokio::test]
    async fn counts_contributors_across_pages() {
        let server = MockServer::start_async().await;
        let full_page: Vec<serde_json::Value> =
            (0..100).map(|id| json!({"login": format!("user{id}")})).collect();
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/octo/demo/contributors")
                    .query_param("per_page", "100")
                    .query_param("anon", "1")
                    .query_param("page", "1");
                then.status(200).json_body(json!(full_page));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/octo/demo/contributors")
                    .query_param("page", "2");
                then.status(200)
                    .json_body(json!([{"login": "late"}, {"type": "Anonymous"}]));
            })
            .await;

        let count = client(&server, None)
            .contributor_count()
            .await
            .expect("count");
        assert_eq!(count, 102);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn contributor_pagination_stops_at_page_cap() {
        let server = MockServer::start_async().await;
        let full_page: Vec<serde_json::Value> =
            (0..100).map(|id| json!({"login": format!("user{id}")})).collect();
        let pages = server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contributors");
                then.status(200).json_body(json!(full_page));
            })
            .await;

        let count = client(&server, None)
            .contributor_count()
            .await
            .expect("count");
        assert_eq!(count, CONTRIBUTORS_PAGE_SIZE * MAX_CONTRIBUTOR_PAGES);
        pages.assert_hits_async(MAX_CONTRIBUTOR_PAGES).await;
    }

    #[tokio::test]
    async fn empty_repository_has_no_contributors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/demo/contributors");
                then.status(204);
            })
            .await;

        let count = client(&server, None)
            .contributor_count()
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn debug_output_redacts_token() {
        let settings = GitHubSettings {
            token: Some("ghp_secret".to_string()),
            ..GitHubSettings::default()
        };
        let github = GitHubClient::new(&settings, RepoSlug::new("octo", "demo").expect("slug"));
        let debug = format!("{github:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
