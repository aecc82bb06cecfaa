//! Audit report model and text, Markdown, and JSON rendering.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationSummary;
use crate::eligibility::EligibilityVerdict;
use crate::inventory::InaccessiblePath;
use crate::languages::{LanguageDistribution, format_language_stats};
use crate::manifest::DependencySet;
use crate::scorer::{Criterion, ScoreReport};
use crate::source::RepoMetadata;

/// Everything produced by one repository audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// When the audit finished.
    pub generated_at: DateTime<Utc>,
    /// Host metadata.
    pub metadata: RepoMetadata,
    /// Contributor count, when it could be fetched.
    pub contributor_count: Option<usize>,
    /// Structural classification.
    pub classification: ClassificationSummary,
    /// Criterion scores.
    pub score: ScoreReport,
    /// Eligibility verdict, when rules were supplied.
    pub eligibility: Option<EligibilityVerdict>,
    /// Paths that could not be listed or read.
    pub inaccessible: Vec<InaccessiblePath>,
    /// Declared dependencies.
    pub dependencies: DependencySet,
}

impl AuditReport {
    /// `owner/repo`.
    pub fn source(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Result of auditing one repository in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The audit completed.
    Completed {
        /// The report.
        report: Box<AuditReport>,
    },
    /// The audit failed before a report could be produced.
    Failed {
        /// `owner/repo` or the raw input.
        repository: String,
        /// Error message.
        error: String,
    },
}

impl AuditOutcome {
    /// Repository the outcome refers to.
    pub fn source(&self) -> String {
        match self {
            AuditOutcome::Completed { report } => report.source(),
            AuditOutcome::Failed { repository, .. } => repository.clone(),
        }
    }

    /// Whether the audit failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, AuditOutcome::Failed { .. })
    }
}

impl From<AuditReport> for AuditOutcome {
    fn from(report: AuditReport) -> Self {
        AuditOutcome::Completed {
            report: Box::new(report),
        }
    }
}

/// Deterministic export file name: `{owner}_{repo}_{YYYYMMDD_HHMMSS}.json`.
pub fn report_file_name(owner: &str, repo: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.json",
        sanitize(owner),
        sanitize(repo),
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Render audit outcomes as Markdown.
pub fn render_markdown(outcomes: &[AuditOutcome]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Repository Audit Report\n");
    for outcome in outcomes {
        let _ = writeln!(output, "## {}\n", outcome.source());
        match outcome {
            AuditOutcome::Failed { error, .. } => {
                let _ = writeln!(output, "- Status: failed ({error})\n");
            }
            AuditOutcome::Completed { report } => append_report_markdown(&mut output, report),
        }
    }
    output
}

/// Render audit outcomes as plain text.
pub fn render_text(outcomes: &[AuditOutcome]) -> String {
    let mut output = String::new();
    for outcome in outcomes {
        match outcome {
            AuditOutcome::Failed { repository, error } => {
                let _ = writeln!(output, "{repository}: audit failed: {error}\n");
            }
            AuditOutcome::Completed { report } => append_report_text(&mut output, report),
        }
    }
    output
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

fn append_report_markdown(output: &mut String, report: &AuditReport) {
    let metadata = &report.metadata;
    if let Some(description) = metadata.description.as_deref() {
        let _ = writeln!(output, "> {description}\n");
    }
    let _ = writeln!(output, "- Final score: **{:.1}/10**", report.score.final_score);
    let _ = writeln!(
        output,
        "- Stars: {} | Forks: {} | Fork: {}",
        metadata.stargazers_count,
        metadata.forks_count,
        if metadata.fork { "yes" } else { "no" }
    );
    let _ = writeln!(
        output,
        "- Contributors: {}",
        report
            .contributor_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    if let Some(license) = metadata.license.as_deref() {
        let _ = writeln!(output, "- License: {license}");
    }
    let _ = writeln!(output, "- Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(output);

    let _ = writeln!(output, "### Scores");
    let _ = writeln!(output, "| Criterion | Score | Heuristic | Judgment | Weight |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    for criterion in Criterion::ALL {
        let Some(sub) = report.score.subscores.get(&criterion) else {
            continue;
        };
        let weight = report.score.weights.get(&criterion).copied().unwrap_or_default();
        let judgment = sub
            .judgment
            .map(|value| format!("{value:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "| {criterion} | {:.1} | {:.1} | {judgment} | {weight} |",
            sub.score, sub.heuristic
        );
    }
    let _ = writeln!(output);
    for criterion in Criterion::ALL {
        if let Some(sub) = report.score.subscores.get(&criterion) {
            let _ = writeln!(output, "- **{criterion}**: {}", sub.rationale);
        }
    }
    let _ = writeln!(output);

    append_language_stats(output, &report.classification.language_stats);
    append_structure(output, &report.classification);

    let _ = writeln!(output, "### Quality metrics");
    for (name, metric) in report.classification.quality.entries() {
        let _ = writeln!(output, "- {name}: {:.1}", metric.score);
    }
    let _ = writeln!(output);

    let key_files: Vec<String> = report
        .classification
        .key_files
        .iter()
        .map(|key| format!("`{}` ({:?})", key.path, key.role))
        .collect();
    append_list(output, "Key files", &key_files, "No key files found.");

    if let Some(verdict) = &report.eligibility {
        let _ = writeln!(
            output,
            "### Eligibility: {}",
            if verdict.overall_eligible {
                "eligible"
            } else {
                "not eligible"
            }
        );
        for result in &verdict.results {
            let _ = writeln!(
                output,
                "- [{}] {}: {}",
                result.outcome, result.rule, result.detail
            );
        }
        let _ = writeln!(output);
    }

    let inaccessible: Vec<String> = report
        .inaccessible
        .iter()
        .map(|entry| format!("`{}`: {}", entry.path, entry.reason))
        .collect();
    append_list(
        output,
        "Inaccessible paths",
        &inaccessible,
        "All paths were accessible.",
    );
}

fn append_report_text(output: &mut String, report: &AuditReport) {
    let _ = writeln!(output, "{}", report.source());
    let _ = writeln!(output, "{}", "=".repeat(report.source().len()));
    let _ = writeln!(output, "Final score: {:.1}/10", report.score.final_score);
    for criterion in Criterion::ALL {
        if let Some(sub) = report.score.subscores.get(&criterion) {
            let _ = writeln!(
                output,
                "  {:<16} {:>4.1}  {}",
                criterion.label(),
                sub.score,
                sub.rationale
            );
        }
    }

    let summary = &report.classification;
    let architecture = summary
        .architecture
        .map(|pattern| format!("{pattern:?}"))
        .unwrap_or_else(|| "none detected".to_string());
    let _ = writeln!(output, "Architecture: {architecture}");
    let languages: Vec<String> = format_language_stats(&summary.language_stats)
        .into_iter()
        .map(|(language, percent)| format!("{language} {percent:.1}%"))
        .collect();
    if !languages.is_empty() {
        let _ = writeln!(output, "Languages: {}", languages.join(", "));
    }
    let _ = writeln!(
        output,
        "Files: {} ({} source, {} test), directories: {}",
        summary.counts.total_files,
        summary.counts.code_files,
        summary.counts.test_files,
        summary.counts.total_directories
    );

    if let Some(verdict) = &report.eligibility {
        let _ = writeln!(
            output,
            "Eligible: {}",
            if verdict.overall_eligible { "yes" } else { "no" }
        );
        for result in &verdict.results {
            let _ = writeln!(output, "  [{}] {}: {}", result.outcome, result.rule, result.detail);
        }
    }
    if !report.inaccessible.is_empty() {
        let _ = writeln!(output, "Inaccessible paths: {}", report.inaccessible.len());
    }
    let _ = writeln!(output);
}

fn append_language_stats(output: &mut String, stats: &LanguageDistribution) {
    if stats.is_empty() {
        let _ = writeln!(output, "### Languages\nNo languages detected.\n");
        return;
    }
    let _ = writeln!(output, "### Languages");
    for (language, percent) in format_language_stats(stats) {
        let _ = writeln!(output, "- {language}: {percent:.2}%");
    }
    let _ = writeln!(output);
}

fn append_structure(output: &mut String, summary: &ClassificationSummary) {
    let _ = writeln!(output, "### Structure");
    match summary.architecture {
        Some(pattern) => {
            let _ = writeln!(output, "- Architecture: {pattern:?}");
        }
        None => {
            let _ = writeln!(output, "- Architecture: none detected");
        }
    }
    if !summary.detected_layers.is_empty() {
        let layers: Vec<String> = summary
            .detected_layers
            .iter()
            .map(|layer| format!("{layer:?}"))
            .collect();
        let _ = writeln!(output, "- Layers: {}", layers.join(", "));
    }
    if !summary.design_patterns.is_empty() {
        let patterns: Vec<String> = summary
            .design_patterns
            .iter()
            .map(|pattern| format!("{pattern:?}"))
            .collect();
        let _ = writeln!(output, "- Design patterns: {}", patterns.join(", "));
    }
    if let Some(extension) = summary.dominant_extension.as_deref() {
        let _ = writeln!(output, "- Dominant extension: .{extension}");
    }
    let _ = writeln!(
        output,
        "- Directory depth: mean {:.2}, variance {:.2}",
        summary.directory_depth_stats.mean, summary.directory_depth_stats.variance
    );
    let _ = writeln!(output);
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "### {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "### {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::{Outcome, RuleKind, RuleResult};
    use crate::scorer::SubScore;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn sample_report() -> AuditReport {
        let subscores = Criterion::ALL
            .iter()
            .map(|criterion| {
                (
                    *criterion,
                    SubScore {
                        score: 6.0,
                        heuristic: 6.0,
                        judgment: None,
                        rationale: "matched: readme".to_string(),
                    },
                )
            })
            .collect();
        let weights = Criterion::ALL.iter().map(|c| (*c, 1.0)).collect();
        let mut classification = ClassificationSummary::default();
        classification
            .language_stats
            .insert("Rust".to_string(), 55.5);
        AuditReport {
            owner: "octo".to_string(),
            repo: "demo".to_string(),
            generated_at: Utc.with_ymd_and_hms(2025, 7, 3, 14, 5, 9).unwrap(),
            metadata: RepoMetadata {
                full_name: "octo/demo".to_string(),
                description: Some("A demo".to_string()),
                license: Some("MIT".to_string()),
                ..RepoMetadata::default()
            },
            contributor_count: Some(3),
            classification,
            score: ScoreReport::new(subscores, weights).expect("score"),
            eligibility: Some(EligibilityVerdict::from_results(vec![RuleResult {
                rule: RuleKind::TeamSize,
                outcome: Outcome::Fail,
                detail: "5 contributors exceeds the limit of 4".to_string(),
            }])),
            inaccessible: vec![InaccessiblePath {
                path: "secret".to_string(),
                reason: "not found: secret".to_string(),
            }],
            dependencies: DependencySet::default(),
        }
    }

    #[test]
    fn report_file_name_is_deterministic() {
        let timestamp = Utc.with_ymd_and_hms(2025, 7, 3, 14, 5, 9).unwrap();
        assert_eq!(
            report_file_name("octo", "demo", timestamp),
            "octo_demo_20250703_140509.json"
        );
        assert_eq!(
            report_file_name("oc to", "de/mo", timestamp),
            "oc-to_de-mo_20250703_140509.json"
        );
    }

    #[test]
    fn renders_markdown_report() {
        let outcomes = vec![
            AuditOutcome::from(sample_report()),
            AuditOutcome::Failed {
                repository: "octo/missing".to_string(),
                error: "repository not found: octo/missing".to_string(),
            },
        ];
        let output = render_markdown(&outcomes);
        assert!(output.contains("# Repository Audit Report"));
        assert!(output.contains("## octo/demo"));
        assert!(output.contains("Final score: **6.0/10**"));
        assert!(output.contains("| Code Quality | 6.0 | 6.0 | - | 1 |"));
        assert!(output.contains("Rust: 55.50%"));
        assert!(output.contains("### Eligibility: not eligible"));
        assert!(output.contains("[FAIL] team size"));
        assert!(output.contains("`secret`: not found: secret"));
        assert!(output.contains("Status: failed (repository not found: octo/missing)"));
    }

    #[test]
    fn renders_text_report() {
        let output = render_text(&[AuditOutcome::from(sample_report())]);
        assert!(output.starts_with("octo/demo\n========="));
        assert!(output.contains("Final score: 6.0/10"));
        assert!(output.contains("Eligible: no"));
        assert!(output.contains("Languages: Rust 55.5%"));
    }

    #[test]
    fn renders_json_payload() {
        let json = render_json(&sample_report()).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed["owner"], "octo");
        assert_eq!(parsed["score"]["finalScore"], 6.0);
        assert_eq!(parsed["score"]["subscores"]["code_quality"]["score"], 6.0);
        assert_eq!(parsed["eligibility"]["overallEligible"], false);
        assert_eq!(parsed["eligibility"]["results"][0]["outcome"], "FAIL");

        let outcomes = render_json(&[AuditOutcome::Failed {
            repository: "octo/x".to_string(),
            error: "boom".to_string(),
        }])
        .expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&outcomes).expect("parse");
        assert_eq!(parsed[0]["status"], "failed");
    }

    #[test]
    fn empty_sections_use_placeholders() {
        let mut report = sample_report();
        report.classification.language_stats = BTreeMap::new();
        report.inaccessible.clear();
        report.eligibility = None;
        let output = render_markdown(&[report.into()]);
        assert!(output.contains("No languages detected."));
        assert!(output.contains("All paths were accessible."));
        assert!(!output.contains("### Eligibility"));
    }
}
