//! End-to-end audit of a single repository.

use std::collections::BTreeMap;

use chrono::Utc;
use log::{info, warn};

use crate::classifier::Classifier;
use crate::config::AuditConfig;
use crate::crawler::Crawler;
use crate::eligibility::{EligibilityEvidence, HackathonRules, evaluate};
use crate::error::{AuditError, Result};
use crate::github::GitHubClient;
use crate::judge::{Judge, JudgeContext};
use crate::manifest::collect_dependencies;
use crate::report::AuditReport;
use crate::scorer::{Scorer, ScoringInput};
use crate::source::{ContentSource, MetadataSource, RepoSlug};

/// Runs metadata, crawl, classification, scoring, and eligibility for a repository.
pub struct Auditor {
    config: AuditConfig,
    classifier: Classifier,
    scorer: Scorer,
    judge: Option<Judge>,
}

impl Auditor {
    /// Create an auditor; the judgment layer is enabled when LLM settings exist.
    ///
    /// Fails when the scoring configuration is invalid.
    pub fn new(config: AuditConfig) -> Result<Self> {
        let judge = config.llm.as_ref().map(Judge::from_settings);
        let scorer = Scorer::new(config.rules.scoring.clone())?;
        Ok(Self {
            config,
            classifier: Classifier::new(),
            scorer,
            judge,
        })
    }

    /// Replace the judge, or disable judgments with `None`.
    pub fn with_judge(mut self, judge: Option<Judge>) -> Self {
        self.judge = judge;
        self
    }

    /// Whether LLM judgments will be requested.
    pub fn judgments_enabled(&self) -> bool {
        self.judge.is_some()
    }

    /// Configuration in use.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit a GitHub repository.
    pub async fn run(
        &self,
        slug: &RepoSlug,
        rules: Option<&HackathonRules>,
    ) -> Result<AuditReport> {
        let client = GitHubClient::new(&self.config.github, slug.clone());
        self.audit(slug, &client, &client, rules).await
    }

    /// Audit a repository through arbitrary sources.
    ///
    /// A missing repository aborts the audit. Contributor, path, manifest,
    /// and judgment failures only degrade the report.
    pub async fn audit<C, M>(
        &self,
        slug: &RepoSlug,
        content: &C,
        metadata_source: &M,
        rules: Option<&HackathonRules>,
    ) -> Result<AuditReport>
    where
        C: ContentSource + ?Sized,
        M: MetadataSource + ?Sized,
    {
        info!("auditing {slug}");
        let metadata = metadata_source.repository().await.map_err(|err| {
            if err.is_not_found() {
                AuditError::RepositoryNotFound {
                    owner: slug.owner.clone(),
                    repo: slug.repo.clone(),
                }
            } else {
                err
            }
        })?;

        let contributor_count = match metadata_source.contributor_count().await {
            Ok(count) => Some(count),
            Err(err) => {
                warn!("contributor count for {slug} unavailable: {err}");
                None
            }
        };

        let inventory = Crawler::new(content, &self.config.rules.crawl)
            .crawl(slug)
            .await?;
        let classification = self.classifier.classify(&inventory);
        let dependencies = collect_dependencies(&inventory);

        let judgments = match &self.judge {
            Some(judge) => {
                info!("requesting judgments for {slug}");
                let name = slug.to_string();
                let context = JudgeContext {
                    name: &name,
                    metadata: Some(&metadata),
                    summary: &classification,
                    readme: inventory.readme().map(|(_, content)| content),
                };
                judge.judge_all(&context).await
            }
            None => BTreeMap::new(),
        };

        let input = ScoringInput::new(&inventory, &classification, &dependencies, Some(&metadata));
        let score = self.scorer.score(&input, &judgments)?;

        let eligibility = rules.map(|rules| {
            evaluate(
                rules,
                &EligibilityEvidence {
                    metadata: &metadata,
                    contributor_count,
                    inventory: &inventory,
                },
            )
        });

        info!("audited {slug}: final score {:.1}", score.final_score);
        Ok(AuditReport {
            owner: slug.owner.clone(),
            repo: slug.repo.clone(),
            generated_at: Utc::now(),
            contributor_count,
            classification,
            score,
            eligibility,
            inaccessible: inventory.inaccessible.clone(),
            dependencies,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GitHubSettings, RuleConfig};
    use crate::eligibility::{Outcome, RuleKind};
    use crate::judge::MockCompletionService;
    use crate::scorer::Criterion;
    use crate::source::{ContentEntry, MockContentSource, MockMetadataSource, RepoMetadata};
    use std::time::Duration;

    fn slug() -> RepoSlug {
        RepoSlug::new("octo", "demo").expect("slug")
    }

    fn offline_config() -> AuditConfig {
        AuditConfig {
            github: GitHubSettings::default(),
            llm: None,
            rules: RuleConfig::default(),
        }
    }

    fn content_source() -> MockContentSource {
        let mut source = MockContentSource::new();
        source.expect_list_directory().returning(|path| match path {
            "" => Ok(vec![
                ContentEntry::file("README.md", 60),
                ContentEntry::file("package.json", 40),
                ContentEntry::dir("src"),
            ]),
            "src" => Ok(vec![ContentEntry::file("src/index.js", 30)]),
            other => Err(AuditError::NotFound(other.to_string())),
        });
        source.expect_read_file().returning(|path| match path {
            "README.md" => Ok("# Demo\n## Installation\nnpm install\n".to_string()),
            "package.json" => Ok(r#"{"dependencies": {"express": "4"}}"#.to_string()),
            _ => Ok("const app = require('express')();\napp.get('/', () => {});\n".to_string()),
        });
        source
    }

    fn metadata_source(contributors: Option<usize>) -> MockMetadataSource {
        let mut source = MockMetadataSource::new();
        source.expect_repository().returning(|| {
            Ok(RepoMetadata {
                full_name: "octo/demo".to_string(),
                created_at: Some("2025-07-02T09:00:00Z".to_string()),
                ..RepoMetadata::default()
            })
        });
        source
            .expect_contributor_count()
            .returning(move || contributors.ok_or_else(|| AuditError::Network("down".to_string())));
        source
    }

    #[tokio::test]
    async fn audit_produces_full_report() {
        let auditor = Auditor::new(offline_config()).expect("auditor");
        let rules = HackathonRules {
            start_date: Some("2025-07-01".to_string()),
            deadline: Some("2025-07-07".to_string()),
            max_team_size: Some(4),
            ..HackathonRules::default()
        };
        let report = auditor
            .audit(&slug(), &content_source(), &metadata_source(Some(3)), Some(&rules))
            .await
            .expect("audit");

        assert_eq!(report.source(), "octo/demo");
        assert_eq!(report.contributor_count, Some(3));
        assert_eq!(report.classification.counts.total_files, 3);
        assert!(report.dependencies.has("express"));
        assert_eq!(report.score.subscores.len(), 5);
        assert!(report.score.subscores.values().all(|sub| sub.judgment.is_none()));
        assert!((0.0..=10.0).contains(&report.score.final_score));
        let verdict = report.eligibility.expect("verdict");
        assert!(verdict.overall_eligible);
    }

    #[tokio::test]
    async fn missing_repository_is_fatal() {
        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_repository()
            .returning(|| Err(AuditError::NotFound("octo/demo".to_string())));
        metadata.expect_contributor_count().never();
        let mut content = MockContentSource::new();
        content.expect_list_directory().never();

        let auditor = Auditor::new(offline_config()).expect("auditor");
        let err = auditor
            .audit(&slug(), &content, &metadata, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::RepositoryNotFound { .. }));
    }

    #[tokio::test]
    async fn contributor_failure_only_affects_team_rule() {
        let rules = HackathonRules {
            max_team_size: Some(4),
            ..HackathonRules::default()
        };
        let auditor = Auditor::new(offline_config()).expect("auditor");
        let report = auditor
            .audit(&slug(), &content_source(), &metadata_source(None), Some(&rules))
            .await
            .expect("audit");
        assert_eq!(report.contributor_count, None);
        let verdict = report.eligibility.expect("verdict");
        assert_eq!(
            verdict.result(RuleKind::TeamSize).map(|result| result.outcome),
            Some(Outcome::Error)
        );
    }

    #[test]
    fn invalid_scoring_config_is_rejected_up_front() {
        let mut config = offline_config();
        config.rules.scoring.judgment_blend = 2.0;
        assert!(matches!(Auditor::new(config), Err(AuditError::Config(_))));
    }

    #[tokio::test]
    async fn judgments_are_requested_when_enabled() {
        let mut service = MockCompletionService::new();
        service
            .expect_complete()
            .times(5)
            .returning(|_, _| Ok("Score: 9/10".to_string()));
        let judge = Judge::new(Box::new(service), "test-model", Duration::from_secs(1));
        let auditor = Auditor::new(offline_config())
            .expect("auditor")
            .with_judge(Some(judge));
        assert!(auditor.judgments_enabled());

        let report = auditor
            .audit(&slug(), &content_source(), &metadata_source(Some(1)), None)
            .await
            .expect("audit");
        let innovation = &report.score.subscores[&Criterion::Innovation];
        assert_eq!(innovation.judgment, Some(9.0));
        assert!(report.eligibility.is_none());
    }
}
