//! Structural classification of a repository inventory.
//!
//! Every detector is a row in a static table and is evaluated independently
//! over a precomputed [`Facts`] view, so the summary is a pure function of the
//! inventory.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::inventory::RepositoryInventory;
use crate::languages::{LanguageDistribution, language_distribution};
use crate::source::{base_name, extension};

const NO_EXTENSION: &str = "(none)";
const OVERSIZED_SOURCE_BYTES: u64 = 100_000;

/// Structural role inferred from directory names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    /// UI components, views, templates.
    Presentation,
    /// Services and domain logic.
    BusinessLogic,
    /// Models, repositories, persistence.
    DataAccess,
    /// Helpers and shared utilities.
    Utility,
    /// Configuration modules.
    Configuration,
    /// Request/response middleware.
    Middleware,
}

/// Architecture conventions, listed in detection priority order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchitecturePattern {
    /// Next.js `pages/` or `app/` router layout.
    NextJs,
    /// Django project with `manage.py`.
    Django,
    /// Ruby on Rails `app/` + `config/routes.rb`.
    Rails,
    /// Spring Boot `src/main/java` layout.
    SpringBoot,
    /// Flask or FastAPI service.
    PythonService,
    /// Workspace of several packages.
    Monorepo,
    /// Several independently deployable services.
    Microservices,
    /// Models + controllers (+ views).
    Mvc,
    /// Three or more distinct layers.
    Layered,
    /// Component directory driven front end.
    ComponentBased,
}

/// Design patterns recognised by name or content keywords.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesignPattern {
    /// Factory functions or classes.
    Factory,
    /// Singleton instances.
    Singleton,
    /// Observer / event emitter.
    Observer,
    /// Strategy objects.
    Strategy,
    /// Adapters.
    Adapter,
    /// Decorators.
    Decorator,
    /// Repository / data mapper.
    Repository,
    /// Builders.
    Builder,
    /// Middleware chains.
    Middleware,
    /// Dependency injection containers.
    DependencyInjection,
}

/// Why a file is considered a key file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    /// Program entry point.
    EntryPoint,
    /// Build, package, or runtime configuration.
    Configuration,
    /// Project documentation.
    Documentation,
}

/// A file singled out by name or extension rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    /// Repository-relative path.
    pub path: String,
    /// Role of the file.
    pub role: FileRole,
}

/// Mean and population variance of directory depths.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthStats {
    /// Mean number of path segments.
    pub mean: f64,
    /// Population variance of path segment counts.
    pub variance: f64,
}

/// File counts by category.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCounts {
    /// Every recorded file.
    pub total_files: usize,
    /// Every recorded directory.
    pub total_directories: usize,
    /// Source files.
    pub code_files: usize,
    /// Source files that are tests.
    pub test_files: usize,
    /// Documentation files.
    pub doc_files: usize,
    /// Configuration files.
    pub config_files: usize,
    /// Files whose content was fetched.
    pub fetched_files: usize,
}

/// A 0-10 heuristic score and the rules that contributed to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Score clamped to [0, 10].
    pub score: f64,
    /// Identifiers of matched rules.
    pub matched: Vec<String>,
}

/// The eight code quality metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    /// Consistency of file naming conventions.
    pub naming_consistency: Metric,
    /// Conventional top-level layout.
    pub structural_consistency: Metric,
    /// Recognisable architecture and design patterns.
    pub pattern_consistency: Metric,
    /// Tooling that keeps the project maintainable.
    pub maintainability: Metric,
    /// Documentation, formatting, and comment signals.
    pub readability: Metric,
    /// Performance-minded techniques in the code.
    pub performance: Metric,
    /// Secret hygiene and security tooling.
    pub security: Metric,
    /// Tests and test infrastructure.
    pub testability: Metric,
}

impl QualityMetrics {
    /// All metrics with their names, in a fixed order.
    pub fn entries(&self) -> [(&'static str, &Metric); 8] {
        [
            ("naming consistency", &self.naming_consistency),
            ("structural consistency", &self.structural_consistency),
            ("pattern consistency", &self.pattern_consistency),
            ("maintainability", &self.maintainability),
            ("readability", &self.readability),
            ("performance", &self.performance),
            ("security", &self.security),
            ("testability", &self.testability),
        ]
    }

    /// Mean of all eight scores.
    pub fn mean(&self) -> f64 {
        let entries = self.entries();
        entries.iter().map(|(_, metric)| metric.score).sum::<f64>() / entries.len() as f64
    }
}

/// Read-only structural view of a repository inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    /// Extension -> number of files.
    pub file_type_counts: BTreeMap<String, usize>,
    /// Most common extension.
    pub dominant_extension: Option<String>,
    /// Directory depth statistics.
    pub directory_depth_stats: DepthStats,
    /// Layers inferred from directory names.
    pub detected_layers: BTreeSet<Layer>,
    /// Entry points, configuration, and documentation files.
    pub key_files: Vec<KeyFile>,
    /// Highest-priority matching architecture convention.
    pub architecture: Option<ArchitecturePattern>,
    /// Design patterns found by name or content.
    pub design_patterns: BTreeSet<DesignPattern>,
    /// Language percentages over fetched lines.
    pub language_stats: LanguageDistribution,
    /// File counts by category.
    pub counts: FileCounts,
    /// Heuristic quality metrics.
    pub quality: QualityMetrics,
}

/// Keyword row mapping directory names to a layer.
pub struct LayerRule {
    /// Layer reported on match.
    pub layer: Layer,
    /// Substrings matched against lowercased directory names.
    pub keywords: &'static [&'static str],
}

/// Architecture detector; rows are tried in order and the first match wins.
pub struct ArchitectureRule {
    /// Pattern reported on match.
    pub pattern: ArchitecturePattern,
    /// Detector.
    pub matches: fn(&Facts) -> bool,
}

/// Keyword row for a design pattern.
pub struct DesignPatternRule {
    /// Pattern reported on match.
    pub pattern: DesignPattern,
    /// Substrings matched against lowercased file base names.
    pub name_keywords: &'static [&'static str],
    /// Substrings matched against lowercased source contents.
    pub content_keywords: &'static [&'static str],
}

/// One additive (or, with negative points, subtractive) metric rule.
pub struct MetricRule {
    /// Stable identifier reported when matched.
    pub id: &'static str,
    /// Points added when matched.
    pub points: f64,
    /// Predicate over the facts.
    pub applies: fn(&Facts) -> bool,
}

/// Base value plus rules for one metric.
pub struct MetricSpec {
    /// Starting value before bonuses.
    pub base: f64,
    /// Rules evaluated independently.
    pub rules: &'static [MetricRule],
}

impl MetricSpec {
    /// Evaluate the metric against the facts.
    pub fn evaluate(&self, facts: &Facts) -> Metric {
        let mut score = self.base;
        let mut matched = Vec::new();
        for rule in self.rules {
            if (rule.applies)(facts) {
                score += rule.points;
                matched.push(rule.id.to_string());
            }
        }
        Metric {
            score: score.clamp(0.0, 10.0),
            matched,
        }
    }
}

/// Detector tables used by [`Classifier::classify`].
pub struct Classifier {
    layers: &'static [LayerRule],
    architectures: &'static [ArchitectureRule],
    design_patterns: &'static [DesignPatternRule],
    metrics: &'static QualityTables,
}

/// Metric specifications, one per quality metric.
pub struct QualityTables {
    /// Naming consistency.
    pub naming_consistency: MetricSpec,
    /// Structural consistency.
    pub structural_consistency: MetricSpec,
    /// Pattern consistency.
    pub pattern_consistency: MetricSpec,
    /// Maintainability.
    pub maintainability: MetricSpec,
    /// Readability.
    pub readability: MetricSpec,
    /// Performance.
    pub performance: MetricSpec,
    /// Security.
    pub security: MetricSpec,
    /// Testability.
    pub testability: MetricSpec,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            layers: LAYER_RULES,
            architectures: ARCHITECTURE_RULES,
            design_patterns: DESIGN_PATTERN_RULES,
            metrics: &QUALITY_TABLES,
        }
    }
}

impl Classifier {
    /// Create a classifier with the built-in tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with custom tables.
    pub fn with_tables(
        layers: &'static [LayerRule],
        architectures: &'static [ArchitectureRule],
        design_patterns: &'static [DesignPatternRule],
        metrics: &'static QualityTables,
    ) -> Self {
        Self {
            layers,
            architectures,
            design_patterns,
            metrics,
        }
    }

    /// Derive the classification summary of an inventory.
    pub fn classify(&self, inventory: &RepositoryInventory) -> ClassificationSummary {
        let mut facts = Facts::new(inventory);
        facts.layers = self.detect_layers(&facts);
        facts.design_patterns = self.detect_design_patterns(&facts);
        facts.architecture = self
            .architectures
            .iter()
            .find(|rule| (rule.matches)(&facts))
            .map(|rule| rule.pattern);

        let tables = self.metrics;
        let quality = QualityMetrics {
            naming_consistency: tables.naming_consistency.evaluate(&facts),
            structural_consistency: tables.structural_consistency.evaluate(&facts),
            pattern_consistency: tables.pattern_consistency.evaluate(&facts),
            maintainability: tables.maintainability.evaluate(&facts),
            readability: tables.readability.evaluate(&facts),
            performance: tables.performance.evaluate(&facts),
            security: tables.security.evaluate(&facts),
            testability: tables.testability.evaluate(&facts),
        };

        let file_type_counts = file_type_counts(inventory);
        ClassificationSummary {
            dominant_extension: dominant_extension(&file_type_counts),
            file_type_counts,
            directory_depth_stats: facts.depth,
            detected_layers: facts.layers.clone(),
            key_files: key_files(inventory),
            architecture: facts.architecture,
            design_patterns: facts.design_patterns.clone(),
            language_stats: language_distribution(inventory),
            counts: facts.counts,
            quality,
        }
    }

    fn detect_layers(&self, facts: &Facts) -> BTreeSet<Layer> {
        self.layers
            .iter()
            .filter(|rule| {
                facts
                    .dir_names
                    .iter()
                    .any(|name| rule.keywords.iter().any(|keyword| name.contains(keyword)))
            })
            .map(|rule| rule.layer)
            .collect()
    }

    fn detect_design_patterns(&self, facts: &Facts) -> BTreeSet<DesignPattern> {
        self.design_patterns
            .iter()
            .filter(|rule| {
                facts.file_names.iter().any(|name| {
                    rule.name_keywords
                        .iter()
                        .any(|keyword| name.contains(keyword))
                }) || facts.source_contains_any(rule.content_keywords)
            })
            .map(|rule| rule.pattern)
            .collect()
    }
}

/// Precomputed, lowercased view of an inventory shared by all detectors.
pub struct Facts<'a> {
    /// The inventory being classified.
    pub inventory: &'a RepositoryInventory,
    /// Lowercased file paths.
    pub files: BTreeSet<String>,
    /// Lowercased directory paths.
    pub dirs: BTreeSet<String>,
    /// Lowercased file base names.
    pub file_names: BTreeSet<String>,
    /// Lowercased directory base names.
    pub dir_names: BTreeSet<String>,
    /// Lowercased contents of fetched source files.
    pub sources: Vec<String>,
    /// File counts.
    pub counts: FileCounts,
    /// Directory depth statistics.
    pub depth: DepthStats,
    /// Share of source files following the dominant naming convention.
    pub naming_share: f64,
    /// Detected layers.
    pub layers: BTreeSet<Layer>,
    /// Detected design patterns.
    pub design_patterns: BTreeSet<DesignPattern>,
    /// Detected architecture.
    pub architecture: Option<ArchitecturePattern>,
}

impl<'a> Facts<'a> {
    /// Build the facts view; layers, patterns and architecture start empty.
    pub fn new(inventory: &'a RepositoryInventory) -> Self {
        let files = inventory
            .file_paths
            .iter()
            .map(|path| path.to_lowercase())
            .collect::<BTreeSet<_>>();
        let dirs = inventory
            .directory_paths
            .iter()
            .map(|path| path.to_lowercase())
            .collect::<BTreeSet<_>>();
        let file_names = files
            .iter()
            .map(|path| base_name(path).to_string())
            .collect();
        let dir_names = dirs.iter().map(|path| base_name(path).to_string()).collect();
        let sources = inventory
            .contents()
            .filter(|(path, _)| is_code_file(path))
            .map(|(_, content)| content.to_lowercase())
            .collect();

        Self {
            inventory,
            counts: count_files(inventory),
            depth: depth_stats(inventory),
            naming_share: naming_share(inventory),
            files,
            dirs,
            file_names,
            dir_names,
            sources,
            layers: BTreeSet::new(),
            design_patterns: BTreeSet::new(),
            architecture: None,
        }
    }

    /// Whether a file with this exact (lowercase) base name exists.
    pub fn has_file_named(&self, name: &str) -> bool {
        self.file_names.contains(name)
    }

    /// Whether any file base name starts with one of the prefixes.
    pub fn has_file_prefixed(&self, prefixes: &[&str]) -> bool {
        self.file_names
            .iter()
            .any(|name| prefixes.iter().any(|prefix| name.starts_with(prefix)))
    }

    /// Whether a file exists at this exact (lowercase) path.
    pub fn has_path(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Whether a directory exists at this exact (lowercase) path.
    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    /// Whether a directory with one of these base names exists anywhere.
    pub fn has_dir_named(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.dir_names.contains(*name))
    }

    /// Whether any fetched source file contains one of the needles.
    pub fn source_contains_any(&self, needles: &[&str]) -> bool {
        self.sources
            .iter()
            .any(|source| needles.iter().any(|needle| source.contains(needle)))
    }

    /// Lowercased content of a fetched file at an exact path.
    pub fn content_lower(&self, path: &str) -> Option<String> {
        self.inventory.content(path).map(str::to_lowercase)
    }

    /// Whether any README has been recorded.
    pub fn has_readme(&self) -> bool {
        self.file_names.iter().any(|name| is_readme(name))
    }

    /// Whether continuous integration configuration is present.
    pub fn has_ci(&self) -> bool {
        self.has_dir(".github/workflows")
            || self.has_dir(".circleci")
            || self.has_file_named(".gitlab-ci.yml")
            || self.has_file_named(".travis.yml")
            || self.has_file_named("jenkinsfile")
            || self.has_file_named("azure-pipelines.yml")
    }
}

/// Whether the path looks like source code.
pub fn is_code_file(path: &str) -> bool {
    let Some(ext) = extension(path) else {
        return false;
    };
    matches!(
        ext.as_str(),
        "rs" | "py"
            | "js"
            | "jsx"
            | "ts"
            | "tsx"
            | "mjs"
            | "cjs"
            | "vue"
            | "svelte"
            | "go"
            | "java"
            | "kt"
            | "kts"
            | "scala"
            | "c"
            | "h"
            | "cpp"
            | "hpp"
            | "cc"
            | "cxx"
            | "cs"
            | "rb"
            | "php"
            | "swift"
            | "dart"
            | "sol"
            | "ex"
            | "exs"
    )
}

/// Whether the path looks like documentation.
pub fn is_doc_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    if is_readme(base_name(&lower)) {
        return true;
    }
    let ext = extension(&lower).unwrap_or_default();
    if path_components_match(&lower, &["docs", "doc", "documentation"])
        && matches!(ext.as_str(), "md" | "mdx" | "rst" | "adoc" | "txt" | "html")
    {
        return true;
    }
    matches!(ext.as_str(), "md" | "mdx" | "rst" | "adoc")
}

/// Whether the path looks like a test file.
pub fn is_test_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    if path_components_match(&lower, &["test", "tests", "__tests__", "spec", "specs"]) {
        return true;
    }

    let file_name = base_name(&lower);
    if file_name.contains(".test.") || file_name.contains(".spec.") {
        return true;
    }

    let stem = file_name.split('.').next().unwrap_or(file_name);
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.starts_with("spec_")
        || stem.ends_with("_spec")
        || (stem.ends_with("test") && stem.len() > 4 && file_name.ends_with(".java"))
}

/// Whether the path looks like configuration.
pub fn is_config_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = base_name(&lower);
    if CONFIG_FILE_NAMES.contains(&name) {
        return true;
    }
    if name.starts_with('.') && (name.ends_with("rc") || name.contains("rc.")) {
        return true;
    }
    if name.contains(".config.") {
        return true;
    }
    matches!(
        extension(name).as_deref(),
        Some("toml" | "yaml" | "yml" | "ini" | "cfg" | "conf" | "properties")
    ) || (extension(name).as_deref() == Some("json") && !path_components_match(&lower, &["data"]))
}

fn is_readme(lower_name: &str) -> bool {
    lower_name == "readme" || lower_name.starts_with("readme.")
}

fn path_components_match(path: &str, segments: &[&str]) -> bool {
    let mut parts: Vec<&str> = path.split('/').collect();
    parts.pop();
    parts
        .iter()
        .any(|component| segments.iter().any(|target| target == component))
}

fn count_files(inventory: &RepositoryInventory) -> FileCounts {
    let mut counts = FileCounts {
        total_files: inventory.file_paths.len(),
        total_directories: inventory.directory_paths.len(),
        fetched_files: inventory.file_contents.len(),
        ..FileCounts::default()
    };
    for path in &inventory.file_paths {
        if is_doc_file(path) {
            counts.doc_files += 1;
        }
        if is_config_file(path) {
            counts.config_files += 1;
        }
        if is_code_file(path) {
            counts.code_files += 1;
            if is_test_file(path) {
                counts.test_files += 1;
            }
        }
    }
    counts
}

fn depth_stats(inventory: &RepositoryInventory) -> DepthStats {
    let depths: Vec<f64> = inventory
        .directory_paths
        .iter()
        .map(|path| path.split('/').count() as f64)
        .collect();
    if depths.is_empty() {
        return DepthStats::default();
    }
    let count = depths.len() as f64;
    let mean = depths.iter().sum::<f64>() / count;
    let variance = depths.iter().map(|depth| (depth - mean).powi(2)).sum::<f64>() / count;
    DepthStats { mean, variance }
}

fn file_type_counts(inventory: &RepositoryInventory) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for path in &inventory.file_paths {
        let key = extension(path).unwrap_or_else(|| NO_EXTENSION.to_string());
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn dominant_extension(counts: &BTreeMap<String, usize>) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for (ext, count) in counts {
        if ext == NO_EXTENSION {
            continue;
        }
        // Strictly greater keeps the lexicographically first extension on ties.
        if best.is_none_or(|(_, best_count)| *count > best_count) {
            best = Some((ext, *count));
        }
    }
    best.map(|(ext, _)| ext.clone())
}

fn key_files(inventory: &RepositoryInventory) -> Vec<KeyFile> {
    let mut keys: Vec<KeyFile> = inventory
        .file_paths
        .iter()
        .filter_map(|path| {
            key_file_role(path).map(|role| KeyFile {
                path: path.clone(),
                role,
            })
        })
        .collect();
    keys.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.path.cmp(&b.path)));
    keys
}

fn key_file_role(path: &str) -> Option<FileRole> {
    let lower = path.to_lowercase();
    let name = base_name(&lower);
    let stem = name.split('.').next().unwrap_or(name);

    if is_code_file(&lower) && !is_test_file(&lower) && ENTRY_POINT_STEMS.contains(&stem) {
        return Some(FileRole::EntryPoint);
    }
    if KEY_CONFIG_FILES.contains(&name) || name.contains(".config.") {
        return Some(FileRole::Configuration);
    }
    if ["readme", "contributing", "changelog", "license", "code_of_conduct"].contains(&stem)
        || (lower.starts_with("docs/") && is_doc_file(&lower))
    {
        return Some(FileRole::Documentation);
    }
    None
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NamingConvention {
    Snake,
    Kebab,
    Camel,
    Pascal,
    Mixed,
}

fn naming_convention(stem: &str) -> Option<NamingConvention> {
    let has_upper = stem.chars().any(|c| c.is_ascii_uppercase());
    let has_underscore = stem.contains('_');
    let has_dash = stem.contains('-');
    let first_upper = stem.chars().next().is_some_and(|c| c.is_ascii_uppercase());

    match (has_upper, has_underscore, has_dash) {
        (false, false, false) => None,
        (false, true, false) => Some(NamingConvention::Snake),
        (false, false, true) => Some(NamingConvention::Kebab),
        (true, false, false) if first_upper => Some(NamingConvention::Pascal),
        (true, false, false) => Some(NamingConvention::Camel),
        _ => Some(NamingConvention::Mixed),
    }
}

fn naming_share(inventory: &RepositoryInventory) -> f64 {
    let mut neutral = 0usize;
    let mut tallies: BTreeMap<NamingConvention, usize> = BTreeMap::new();
    let mut total = 0usize;
    for path in inventory.file_paths.iter().filter(|path| is_code_file(path)) {
        let name = base_name(path);
        let stem = name.split('.').next().unwrap_or(name).trim_start_matches('_');
        total += 1;
        match naming_convention(stem) {
            None => neutral += 1,
            Some(convention) => *tallies.entry(convention).or_insert(0) += 1,
        }
    }
    if total == 0 {
        return 0.0;
    }
    let dominant = tallies
        .iter()
        .filter(|(convention, _)| **convention != NamingConvention::Mixed)
        .map(|(_, count)| *count)
        .max()
        .unwrap_or(0);
    (dominant + neutral) as f64 / total as f64
}

fn average_source_lines(facts: &Facts) -> Option<f64> {
    if facts.sources.is_empty() {
        return None;
    }
    let lines: usize = facts.sources.iter().map(|source| source.lines().count()).sum();
    Some(lines as f64 / facts.sources.len() as f64)
}

fn commented_share(facts: &Facts) -> f64 {
    if facts.sources.is_empty() {
        return 0.0;
    }
    let commented = facts
        .sources
        .iter()
        .filter(|source| {
            source.contains("//")
                || source.contains("/*")
                || source.contains("\"\"\"")
                || source.lines().any(|line| line.trim_start().starts_with("# "))
        })
        .count();
    commented as f64 / facts.sources.len() as f64
}

static SECRET_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(api[_-]?key|secret|password|passwd|access[_-]?token)["']?\s*[:=]\s*["'][A-Za-z0-9_\-/+]{12,}["']"#,
    )
    .ok()
});

fn has_hardcoded_secret(facts: &Facts) -> bool {
    let Some(pattern) = SECRET_PATTERN.as_ref() else {
        return false;
    };
    facts.inventory.contents().any(|(path, content)| {
        let name = base_name(path).to_lowercase();
        !name.starts_with(".env.")
            && !is_doc_file(path)
            && !is_test_file(path)
            && pattern.is_match(content)
    })
}

const ENTRY_POINT_STEMS: &[&str] = &[
    "main", "index", "app", "server", "manage", "__main__", "cli", "program", "wsgi", "asgi",
];

const KEY_CONFIG_FILES: &[&str] = &[
    "package.json",
    "cargo.toml",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "requirements.txt",
    "pipfile",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "gemfile",
    "composer.json",
    "tsconfig.json",
    "dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "makefile",
    ".env.example",
];

const CONFIG_FILE_NAMES: &[&str] = &[
    "dockerfile",
    "makefile",
    "procfile",
    "gemfile",
    "pipfile",
    "go.mod",
    "setup.py",
    "requirements.txt",
    ".gitignore",
    ".editorconfig",
    ".env.example",
    "pom.xml",
    "build.gradle",
];

/// Directory keyword rows for layer detection.
pub static LAYER_RULES: &[LayerRule] = &[
    LayerRule {
        layer: Layer::Presentation,
        keywords: &[
            "component", "view", "page", "screen", "template", "ui", "frontend", "layout",
        ],
    },
    LayerRule {
        layer: Layer::BusinessLogic,
        keywords: &[
            "service", "domain", "usecase", "use_case", "business", "logic", "core", "handler",
        ],
    },
    LayerRule {
        layer: Layer::DataAccess,
        keywords: &[
            "model", "repositor", "dao", "entity", "entities", "schema", "migration", "db",
            "database", "store",
        ],
    },
    LayerRule {
        layer: Layer::Utility,
        keywords: &["util", "helper", "common", "shared", "lib"],
    },
    LayerRule {
        layer: Layer::Configuration,
        keywords: &["config", "setting", "conf"],
    },
    LayerRule {
        layer: Layer::Middleware,
        keywords: &["middleware", "interceptor", "guard", "filter"],
    },
];

/// Architecture detectors in priority order.
pub static ARCHITECTURE_RULES: &[ArchitectureRule] = &[
    ArchitectureRule {
        pattern: ArchitecturePattern::NextJs,
        matches: |facts| {
            facts.has_file_prefixed(&["next.config."])
                && (facts.has_dir("pages") || facts.has_dir("app") || facts.has_dir("src/app"))
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::Django,
        matches: |facts| {
            facts.has_file_named("manage.py")
                && (facts.has_file_named("settings.py") || facts.has_dir_named(&["settings"]))
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::Rails,
        matches: |facts| facts.has_dir("app/controllers") && facts.has_path("config/routes.rb"),
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::SpringBoot,
        matches: |facts| {
            facts.dirs.iter().any(|dir| dir.ends_with("src/main/java"))
                && (facts.has_file_named("pom.xml") || facts.has_file_prefixed(&["build.gradle"]))
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::PythonService,
        matches: |facts| {
            facts.source_contains_any(&["from flask import", "from fastapi import"])
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::Monorepo,
        matches: |facts| {
            facts.has_file_named("lerna.json")
                || facts.has_file_named("pnpm-workspace.yaml")
                || facts.has_file_named("turbo.json")
                || facts.has_file_named("nx.json")
                || ((facts.has_dir("packages") || facts.has_dir("apps"))
                    && facts
                        .files
                        .iter()
                        .filter(|path| path.ends_with("/package.json"))
                        .count()
                        >= 2)
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::Microservices,
        matches: |facts| {
            let dockerfiles = facts
                .files
                .iter()
                .filter(|path| base_name(path) == "dockerfile")
                .count();
            dockerfiles >= 2
                && (facts.has_dir("services")
                    || facts.has_file_prefixed(&["docker-compose.", "compose."]))
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::Mvc,
        matches: |facts| {
            facts.has_dir_named(&["models", "model"])
                && facts.has_dir_named(&["controllers", "controller"])
        },
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::Layered,
        matches: |facts| facts.layers.len() >= 3,
    },
    ArchitectureRule {
        pattern: ArchitecturePattern::ComponentBased,
        matches: |facts| facts.has_dir_named(&["components"]),
    },
];

/// Design pattern keyword rows.
pub static DESIGN_PATTERN_RULES: &[DesignPatternRule] = &[
    DesignPatternRule {
        pattern: DesignPattern::Factory,
        name_keywords: &["factory"],
        content_keywords: &["factory"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Singleton,
        name_keywords: &["singleton"],
        content_keywords: &["getinstance(", "singleton", "oncelock", "lazy_static!"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Observer,
        name_keywords: &["observer", "listener", "emitter"],
        content_keywords: &["eventemitter", "addeventlistener", ".subscribe(", "notify_observers"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Strategy,
        name_keywords: &["strategy", "strategies"],
        content_keywords: &["strategy"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Adapter,
        name_keywords: &["adapter"],
        content_keywords: &["adapter"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Decorator,
        name_keywords: &["decorator"],
        content_keywords: &["functools.wraps", "@decorator", "def decorator"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Repository,
        name_keywords: &["repository", "repositories"],
        content_keywords: &["repository"],
    },
    DesignPatternRule {
        pattern: DesignPattern::Builder,
        name_keywords: &["builder"],
        content_keywords: &["builder()", "::builder("],
    },
    DesignPatternRule {
        pattern: DesignPattern::Middleware,
        name_keywords: &["middleware"],
        content_keywords: &["app.use(", "middleware"],
    },
    DesignPatternRule {
        pattern: DesignPattern::DependencyInjection,
        name_keywords: &["container", "injector"],
        content_keywords: &["@injectable", "@inject", "dependency_injector", "depends("],
    },
];

/// Built-in metric tables.
pub static QUALITY_TABLES: QualityTables = QualityTables {
    naming_consistency: MetricSpec {
        base: 4.0,
        rules: &[
            MetricRule {
                id: "dominant-naming-convention",
                points: 3.0,
                applies: |facts| facts.naming_share >= 0.8,
            },
            MetricRule {
                id: "mostly-consistent-naming",
                points: 1.5,
                applies: |facts| (0.6..0.8).contains(&facts.naming_share),
            },
            MetricRule {
                id: "no-spaces-in-paths",
                points: 2.0,
                applies: |facts| facts.files.iter().all(|path| !path.contains(' ')),
            },
            MetricRule {
                id: "lowercase-directories",
                points: 1.0,
                applies: |facts| {
                    facts.inventory.directory_paths.iter().all(|path| {
                        let name = base_name(path);
                        name == name.to_lowercase()
                    })
                },
            },
        ],
    },
    structural_consistency: MetricSpec {
        base: 4.0,
        rules: &[
            MetricRule {
                id: "source-root",
                points: 2.0,
                applies: |facts| {
                    ["src", "lib", "app", "pkg", "cmd", "internal"]
                        .iter()
                        .any(|dir| facts.has_dir(dir))
                },
            },
            MetricRule {
                id: "test-root",
                points: 2.0,
                applies: |facts| {
                    ["tests", "test", "__tests__", "spec"]
                        .iter()
                        .any(|dir| facts.has_dir(dir))
                        || facts.counts.test_files > 0
                },
            },
            MetricRule {
                id: "even-depth",
                points: 1.0,
                applies: |facts| facts.depth.variance <= 2.0,
            },
            MetricRule {
                id: "docs-root",
                points: 1.0,
                applies: |facts| {
                    ["docs", "doc", "documentation"]
                        .iter()
                        .any(|dir| facts.has_dir(dir))
                },
            },
        ],
    },
    pattern_consistency: MetricSpec {
        base: 4.0,
        rules: &[
            MetricRule {
                id: "architecture-detected",
                points: 2.0,
                applies: |facts| facts.architecture.is_some(),
            },
            MetricRule {
                id: "design-pattern",
                points: 1.0,
                applies: |facts| !facts.design_patterns.is_empty(),
            },
            MetricRule {
                id: "several-design-patterns",
                points: 1.0,
                applies: |facts| facts.design_patterns.len() >= 2,
            },
            MetricRule {
                id: "many-design-patterns",
                points: 1.0,
                applies: |facts| facts.design_patterns.len() >= 3,
            },
            MetricRule {
                id: "layering",
                points: 1.0,
                applies: |facts| facts.layers.len() >= 2,
            },
        ],
    },
    maintainability: MetricSpec {
        base: 3.0,
        rules: &[
            MetricRule {
                id: "tests-present",
                points: 2.0,
                applies: |facts| facts.counts.test_files > 0,
            },
            MetricRule {
                id: "linter-config",
                points: 1.5,
                applies: |facts| {
                    facts.has_file_prefixed(&[
                        ".eslintrc",
                        "eslint.config.",
                        ".flake8",
                        ".pylintrc",
                        "ruff.toml",
                        ".ruff.toml",
                        "clippy.toml",
                        ".golangci.",
                        ".rubocop.yml",
                        "tslint.json",
                        "biome.json",
                    ])
                },
            },
            MetricRule {
                id: "ci-config",
                points: 1.5,
                applies: |facts| facts.has_ci(),
            },
            MetricRule {
                id: "type-checking",
                points: 1.0,
                applies: |facts| {
                    facts.has_file_named("tsconfig.json")
                        || facts.has_file_named("mypy.ini")
                        || facts.has_file_named("py.typed")
                },
            },
            MetricRule {
                id: "moderate-depth",
                points: 1.0,
                applies: |facts| (1.0..=4.0).contains(&facts.depth.mean),
            },
            MetricRule {
                id: "dependency-manifest",
                points: 1.0,
                applies: |facts| {
                    [
                        "package.json",
                        "cargo.toml",
                        "pyproject.toml",
                        "requirements.txt",
                        "go.mod",
                        "pom.xml",
                        "gemfile",
                        "composer.json",
                    ]
                    .iter()
                    .any(|name| facts.has_path(name))
                },
            },
            MetricRule {
                id: "oversized-source-files",
                points: -1.0,
                applies: |facts| {
                    facts.inventory.file_sizes.iter().any(|(path, size)| {
                        is_code_file(path) && *size > OVERSIZED_SOURCE_BYTES
                    })
                },
            },
        ],
    },
    readability: MetricSpec {
        base: 4.0,
        rules: &[
            MetricRule {
                id: "readme",
                points: 2.0,
                applies: |facts| facts.has_readme(),
            },
            MetricRule {
                id: "formatter-config",
                points: 1.5,
                applies: |facts| {
                    facts.has_file_prefixed(&[
                        ".prettierrc",
                        "prettier.config.",
                        ".editorconfig",
                        "rustfmt.toml",
                        ".rustfmt.toml",
                        ".clang-format",
                    ]) || facts
                        .content_lower("pyproject.toml")
                        .is_some_and(|content| content.contains("[tool.black]"))
                },
            },
            MetricRule {
                id: "commented-code",
                points: 1.5,
                applies: |facts| commented_share(facts) >= 0.3,
            },
            MetricRule {
                id: "short-source-files",
                points: 1.0,
                applies: |facts| average_source_lines(facts).is_some_and(|lines| lines <= 300.0),
            },
        ],
    },
    performance: MetricSpec {
        base: 5.0,
        rules: &[
            MetricRule {
                id: "caching",
                points: 1.0,
                applies: |facts| {
                    facts.source_contains_any(&[
                        "cache",
                        "memoize",
                        "usememo",
                        "lru_cache",
                        "redis",
                    ])
                },
            },
            MetricRule {
                id: "async-io",
                points: 1.0,
                applies: |facts| {
                    facts.source_contains_any(&[
                        "async ",
                        "await ",
                        "promise.all",
                        "asyncio",
                        "go func",
                    ])
                },
            },
            MetricRule {
                id: "lazy-loading",
                points: 1.0,
                applies: |facts| {
                    facts.source_contains_any(&["react.lazy", "lazy(", "dynamic(", "import("])
                },
            },
            MetricRule {
                id: "pagination",
                points: 1.0,
                applies: |facts| facts.source_contains_any(&["paginat", "page_size", "pagesize"]),
            },
            MetricRule {
                id: "build-optimisation",
                points: 1.0,
                applies: |facts| {
                    facts.has_file_prefixed(&["vite.config.", "webpack.config.", "rollup.config."])
                        || facts
                            .content_lower("cargo.toml")
                            .is_some_and(|content| content.contains("[profile.release]"))
                },
            },
        ],
    },
    security: MetricSpec {
        base: 5.0,
        rules: &[
            MetricRule {
                id: "gitignore-env",
                points: 1.5,
                applies: |facts| {
                    facts
                        .content_lower(".gitignore")
                        .is_some_and(|content| content.contains(".env"))
                },
            },
            MetricRule {
                id: "env-example",
                points: 1.0,
                applies: |facts| {
                    facts.has_file_named(".env.example") || facts.has_file_named(".env.sample")
                },
            },
            MetricRule {
                id: "security-policy",
                points: 1.0,
                applies: |facts| facts.has_file_prefixed(&["security."]),
            },
            MetricRule {
                id: "dependency-updates",
                points: 1.0,
                applies: |facts| {
                    facts.has_path(".github/dependabot.yml")
                        || facts.has_path(".github/dependabot.yaml")
                        || facts.has_file_named("renovate.json")
                },
            },
            MetricRule {
                id: "security-libraries",
                points: 1.0,
                applies: |facts| {
                    facts.source_contains_any(&[
                        "bcrypt",
                        "argon2",
                        "helmet",
                        "csrf",
                        "sanitize",
                        "jsonwebtoken",
                        "passlib",
                    ])
                },
            },
            MetricRule {
                id: "committed-env-file",
                points: -2.0,
                applies: |facts| facts.has_file_named(".env"),
            },
            MetricRule {
                id: "hardcoded-secret",
                points: -2.0,
                applies: has_hardcoded_secret,
            },
        ],
    },
    testability: MetricSpec {
        base: 2.0,
        rules: &[
            MetricRule {
                id: "test-files",
                points: 3.0,
                applies: |facts| facts.counts.test_files > 0,
            },
            MetricRule {
                id: "test-ratio",
                points: 2.0,
                applies: |facts| {
                    facts.counts.code_files > 0
                        && facts.counts.test_files as f64 / facts.counts.code_files as f64 >= 0.2
                },
            },
            MetricRule {
                id: "test-config",
                points: 1.5,
                applies: |facts| {
                    facts.has_file_prefixed(&[
                        "jest.config.",
                        "vitest.config.",
                        "karma.conf.",
                        ".mocharc",
                        "pytest.ini",
                        "conftest.py",
                        "phpunit.xml",
                        "tox.ini",
                    ]) || facts
                        .content_lower("pyproject.toml")
                        .is_some_and(|content| content.contains("[tool.pytest"))
                },
            },
            MetricRule {
                id: "ci-config",
                points: 1.5,
                applies: |facts| facts.has_ci(),
            },
        ],
    },
};
