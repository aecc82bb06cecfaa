#![deny(missing_docs)]
//! Repograde core library.
//!
//! This crate crawls a GitHub repository, classifies its structure, scores it
//! against the judging criteria, and checks hackathon eligibility.

pub mod audit;
pub mod classifier;
pub mod config;
pub mod crawler;
pub mod eligibility;
pub mod error;
pub mod github;
pub mod inventory;
pub mod judge;
pub mod languages;
pub mod manifest;
pub mod report;
pub mod scorer;
pub mod source;

pub use audit::Auditor;
pub use classifier::{ClassificationSummary, Classifier};
pub use config::{AuditConfig, CrawlRules, GitHubSettings, LlmSettings, RuleConfig, ScoringConfig};
pub use crawler::Crawler;
pub use eligibility::{EligibilityVerdict, HackathonRules, Outcome, RuleKind, evaluate};
pub use error::{AuditError, Result};
pub use github::GitHubClient;
pub use inventory::RepositoryInventory;
pub use judge::{CompletionService, Judge, Judgment, OpenAiCompletion};
pub use languages::{LanguageDistribution, format_language_stats};
pub use manifest::{DependencySet, collect_dependencies};
pub use report::{
    AuditOutcome, AuditReport, render_json, render_markdown, render_text, report_file_name,
};
pub use scorer::{Criterion, ScoreReport, Scorer};
pub use source::{ContentSource, MetadataSource, RepoMetadata, RepoSlug};
