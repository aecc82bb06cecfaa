//! Immutable configuration for crawling, scoring, and external services.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AuditError, Result};
use crate::scorer::Criterion;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = "repograde";
const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Files larger than this are never recorded.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Skip and selection rules applied while crawling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrawlRules {
    /// Substrings that exclude a path from listing and recording.
    ///
    /// Paths are matched lowercased and wrapped in slashes, so `/env/` only
    /// matches a whole `env` segment while `node_modules` matches anywhere.
    pub skip_directories: Vec<String>,
    /// Extensions of binary or build artifacts that are never recorded.
    pub binary_extensions: Vec<String>,
    /// Files larger than this many bytes are never recorded.
    pub max_file_size: u64,
    /// Extensions whose contents are fetched.
    pub important_extensions: Vec<String>,
    /// Base names whose contents are fetched regardless of extension.
    pub important_file_names: Vec<String>,
    /// Upper bound on fetched file contents per crawl.
    pub max_content_files: usize,
    /// Directories with more path segments than this are not listed.
    pub max_depth: usize,
}

impl Default for CrawlRules {
    fn default() -> Self {
        Self {
            skip_directories: strings(&[
                "node_modules",
                "bower_components",
                "__pycache__",
                ".pytest_cache",
                ".mypy_cache",
                "/.git/",
                "/.venv/",
                "/venv/",
                "/env/",
                "/dist/",
                "/build/",
                "/target/",
                "/out/",
                "/.next/",
                "/.nuxt/",
                "/coverage/",
                "/.cache/",
                "/vendor/",
                "/.idea/",
                "/.vscode/",
                "/.gradle/",
            ]),
            binary_extensions: strings(&[
                "exe", "dll", "so", "dylib", "o", "a", "obj", "lib", "class", "jar", "war", "pyc",
                "pyo", "bin", "dat", "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "whl",
                "iso", "dmg", "pdb", "wasm", "ttf", "otf", "woff", "woff2", "eot",
            ]),
            max_file_size: MAX_FILE_SIZE,
            important_extensions: strings(&[
                "rs", "py", "js", "jsx", "ts", "tsx", "mjs", "cjs", "go", "java", "kt", "swift",
                "rb", "php", "c", "h", "cpp", "hpp", "cc", "cs", "vue", "svelte", "sol", "md",
                "mdx", "rst", "txt", "json", "toml", "yaml", "yml", "cfg", "ini", "html", "css",
                "scss", "sql", "sh",
            ]),
            important_file_names: strings(&[
                "README",
                "LICENSE",
                "Dockerfile",
                "Makefile",
                "Procfile",
                "Gemfile",
                "Pipfile",
                "go.mod",
                ".gitignore",
                ".env.example",
                ".editorconfig",
                ".eslintrc",
                ".prettierrc",
            ]),
            max_content_files: 150,
            max_depth: 12,
        }
    }
}

impl CrawlRules {
    /// Whether a path contains one of the skip substrings.
    pub fn skips_path(&self, path: &str) -> bool {
        let wrapped = format!("/{}/", path.trim_matches('/').to_lowercase());
        self.skip_directories
            .iter()
            .any(|pattern| wrapped.contains(&pattern.to_lowercase()))
    }

    /// Whether a file is excluded from the inventory entirely.
    pub fn skips_file(&self, path: &str, size: u64) -> bool {
        if size > self.max_file_size || self.skips_path(path) {
            return true;
        }
        crate::source::extension(path)
            .map(|ext| self.binary_extensions.iter().any(|skip| *skip == ext))
            .unwrap_or(false)
    }

    /// Whether a file qualifies for content fetching.
    pub fn is_important(&self, path: &str) -> bool {
        let name = crate::source::base_name(path);
        if self
            .important_file_names
            .iter()
            .any(|known| name.eq_ignore_ascii_case(known))
        {
            return true;
        }
        let stem = name.split('.').next().unwrap_or(name);
        if ["readme", "license", "contributing", "changelog"]
            .iter()
            .any(|known| stem.eq_ignore_ascii_case(known))
        {
            return true;
        }
        crate::source::extension(path)
            .map(|ext| self.important_extensions.iter().any(|known| *known == ext))
            .unwrap_or(false)
    }
}

/// Criterion weights and LLM blending for the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Weight per criterion; a partial map overrides only the named criteria.
    #[serde(deserialize_with = "merge_default_weights")]
    pub weights: BTreeMap<Criterion, f64>,
    /// Share of a criterion score taken from the LLM judgment, in [0,1].
    pub judgment_blend: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (Criterion::CodeQuality, 25.0),
            (Criterion::Documentation, 20.0),
            (Criterion::Functionality, 25.0),
            (Criterion::Innovation, 15.0),
            (Criterion::UserExperience, 15.0),
        ]);
        Self {
            weights,
            judgment_blend: 0.3,
        }
    }
}

impl ScoringConfig {
    /// Check that every criterion has a finite, non-negative weight and that
    /// the blend lies within [0, 1].
    pub fn validate(&self) -> Result<()> {
        if !self.judgment_blend.is_finite() || !(0.0..=1.0).contains(&self.judgment_blend) {
            return Err(AuditError::Config(format!(
                "judgmentBlend must be within [0, 1], got {}",
                self.judgment_blend
            )));
        }
        if let Some(missing) = Criterion::ALL
            .iter()
            .find(|criterion| !self.weights.contains_key(*criterion))
        {
            return Err(AuditError::Config(format!("missing weight for {missing}")));
        }
        if let Some((criterion, weight)) = self
            .weights
            .iter()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(AuditError::Config(format!(
                "invalid weight {weight} for {criterion}"
            )));
        }
        Ok(())
    }
}

fn merge_default_weights<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<Criterion, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<Criterion, f64>::deserialize(deserializer)?;
    let mut weights = ScoringConfig::default().weights;
    weights.extend(overrides);
    Ok(weights)
}

/// Rule tables that can be overridden from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleConfig {
    /// Crawl rules.
    pub crawl: CrawlRules,
    /// Scoring rules.
    pub scoring: ScoringConfig,
}

impl RuleConfig {
    /// Load rule overrides from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RuleConfig = serde_json::from_str(&contents)
            .map_err(|err| AuditError::Config(format!("{}: {err}", path.display())))?;
        config.scoring.validate()?;
        Ok(config)
    }
}

/// GitHub API connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    /// API base URL.
    pub api_url: String,
    /// Optional access token.
    pub token: Option<String>,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// LLM completion service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    /// Chat-completions API base URL.
    pub api_url: String,
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Time budget for a single completion.
    pub timeout: Duration,
}

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone, Default)]
pub struct AuditConfig {
    /// GitHub settings.
    pub github: GitHubSettings,
    /// LLM settings; `None` disables the judgment layer.
    pub llm: Option<LlmSettings>,
    /// Rule tables.
    pub rules: RuleConfig,
}

impl AuditConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let github = GitHubSettings {
            api_url: non_empty("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            token: non_empty("GITHUB_TOKEN"),
            user_agent: non_empty("REPOGRADE_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        let llm = non_empty("OPENAI_API_KEY").map(|api_key| LlmSettings {
            api_url: non_empty("REPOGRADE_LLM_API_URL")
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            api_key,
            model: non_empty("REPOGRADE_LLM_MODEL")
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(
                non_empty("REPOGRADE_LLM_TIMEOUT_SECS")
                    .and_then(|value| value.trim().parse().ok())
                    .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
        });

        Self {
            github,
            llm,
            rules: RuleConfig::default(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
