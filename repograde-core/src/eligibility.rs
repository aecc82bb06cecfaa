//! Hackathon eligibility rules evaluated over metadata already fetched.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::inventory::RepositoryInventory;
use crate::source::{RepoMetadata, base_name, extension};

/// Caller-supplied eligibility rules. Every rule is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HackathonRules {
    /// Earliest allowed creation date (`YYYY-MM-DD` or RFC 3339).
    pub start_date: Option<String>,
    /// Last allowed creation date, inclusive of the whole day.
    pub deadline: Option<String>,
    /// Largest allowed number of contributors.
    pub max_team_size: Option<usize>,
    /// Reject forks.
    pub must_be_original: bool,
    /// Require demo material.
    pub require_demo: bool,
}

impl HackathonRules {
    /// Load rules from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|err| AuditError::Config(format!("{}: {err}", path.display())))
    }

    /// Whether no rule is configured.
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.deadline.is_none()
            && self.max_team_size.is_none()
            && !self.must_be_original
            && !self.require_demo
    }
}

/// The independent eligibility rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// Repository creation inside the submission window.
    DateWindow,
    /// Contributor count within the team limit.
    TeamSize,
    /// Repository is not a fork.
    Originality,
    /// Demo material is present.
    DemoPresence,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuleKind::DateWindow => "date window",
            RuleKind::TeamSize => "team size",
            RuleKind::Originality => "originality",
            RuleKind::DemoPresence => "demo presence",
        };
        f.write_str(label)
    }
}

/// Outcome of one rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The rule is satisfied.
    Pass,
    /// The rule is violated.
    Fail,
    /// The rule could not be evaluated because of malformed input.
    Error,
    /// The rule is not configured.
    NotApplicable,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Error => "ERROR",
            Outcome::NotApplicable => "N/A",
        };
        f.write_str(label)
    }
}

/// One evaluated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Which rule.
    pub rule: RuleKind,
    /// Its outcome.
    pub outcome: Outcome,
    /// Human readable explanation.
    pub detail: String,
}

impl RuleResult {
    fn new(rule: RuleKind, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            rule,
            outcome,
            detail: detail.into(),
        }
    }
}

/// Results of every rule and the overall decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityVerdict {
    /// One result per rule.
    pub results: Vec<RuleResult>,
    /// True unless some rule failed or errored.
    pub overall_eligible: bool,
}

impl EligibilityVerdict {
    /// Combine rule results.
    pub fn from_results(results: Vec<RuleResult>) -> Self {
        let overall_eligible = results
            .iter()
            .all(|result| matches!(result.outcome, Outcome::Pass | Outcome::NotApplicable));
        Self {
            results,
            overall_eligible,
        }
    }

    /// Result of a specific rule.
    pub fn result(&self, rule: RuleKind) -> Option<&RuleResult> {
        self.results.iter().find(|result| result.rule == rule)
    }
}

/// Facts the rules are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityEvidence<'a> {
    /// Repository metadata.
    pub metadata: &'a RepoMetadata,
    /// Contributor count, when it could be fetched.
    pub contributor_count: Option<usize>,
    /// Crawled inventory, for demo detection.
    pub inventory: &'a RepositoryInventory,
}

/// Evaluate every rule independently.
pub fn evaluate(rules: &HackathonRules, evidence: &EligibilityEvidence<'_>) -> EligibilityVerdict {
    EligibilityVerdict::from_results(vec![
        date_window(rules, evidence.metadata),
        team_size(rules, evidence.contributor_count),
        originality(rules, evidence.metadata),
        demo_presence(rules, evidence),
    ])
}

fn date_window(rules: &HackathonRules, metadata: &RepoMetadata) -> RuleResult {
    let rule = RuleKind::DateWindow;
    if rules.start_date.is_none() && rules.deadline.is_none() {
        return RuleResult::new(rule, Outcome::NotApplicable, "no submission window configured");
    }

    let (created, start, end) = match window_bounds(rules, metadata) {
        Ok(bounds) => bounds,
        Err(message) => return RuleResult::new(rule, Outcome::Error, message),
    };

    let created_text = created.format("%Y-%m-%d %H:%M:%S UTC");
    if let Some(start) = start.filter(|start| created < *start) {
        return RuleResult::new(
            rule,
            Outcome::Fail,
            format!(
                "created {created_text}, before the start {}",
                start.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        );
    }
    if let Some(end) = end.filter(|end| created > *end) {
        return RuleResult::new(
            rule,
            Outcome::Fail,
            format!(
                "created {created_text}, after the deadline {}",
                end.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        );
    }
    RuleResult::new(
        rule,
        Outcome::Pass,
        format!("created {created_text}, inside the submission window"),
    )
}

type WindowBounds = (DateTime<Utc>, Option<DateTime<Utc>>, Option<DateTime<Utc>>);

fn window_bounds(
    rules: &HackathonRules,
    metadata: &RepoMetadata,
) -> std::result::Result<WindowBounds, String> {
    let created = metadata
        .created_at
        .as_deref()
        .ok_or_else(|| "repository creation date is unknown".to_string())
        .and_then(|value| parse_instant(value, false))?;
    let start = rules
        .start_date
        .as_deref()
        .map(|value| parse_instant(value, false))
        .transpose()?;
    let end = rules
        .deadline
        .as_deref()
        .map(|value| parse_instant(value, true))
        .transpose()?;
    Ok((created, start, end))
}

/// Parse `YYYY-MM-DD` (start or end of that UTC day) or an RFC 3339 instant.
fn parse_instant(value: &str, end_of_day: bool) -> std::result::Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{value}': {err}"))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date '{value}'"))
}

fn team_size(rules: &HackathonRules, contributors: Option<usize>) -> RuleResult {
    let rule = RuleKind::TeamSize;
    let Some(max) = rules.max_team_size else {
        return RuleResult::new(rule, Outcome::NotApplicable, "no team size limit configured");
    };
    match contributors {
        None => RuleResult::new(rule, Outcome::Error, "contributor count is unavailable"),
        Some(count) if count <= max => RuleResult::new(
            rule,
            Outcome::Pass,
            format!("{count} contributors, limit {max}"),
        ),
        Some(count) => RuleResult::new(
            rule,
            Outcome::Fail,
            format!("{count} contributors exceeds the limit of {max}"),
        ),
    }
}

fn originality(rules: &HackathonRules, metadata: &RepoMetadata) -> RuleResult {
    let rule = RuleKind::Originality;
    match (metadata.fork, rules.must_be_original) {
        (false, _) => RuleResult::new(rule, Outcome::Pass, "repository is not a fork"),
        (true, true) => RuleResult::new(
            rule,
            Outcome::Fail,
            "repository is a fork but original work is required",
        ),
        (true, false) => RuleResult::new(
            rule,
            Outcome::NotApplicable,
            "repository is a fork; originality is not required",
        ),
    }
}

const DEMO_PATH_KEYWORDS: &[&str] = &["demo", "screenshot", "preview", "showcase"];
const VIDEO_EXTENSIONS: &[&str] = &["gif", "mp4", "mov", "webm", "avi", "mkv"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "svg"];
const DEMO_LINK_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "loom.com",
    "devpost.com",
    "vercel.app",
    "netlify.app",
    "herokuapp.com",
];

fn demo_presence(rules: &HackathonRules, evidence: &EligibilityEvidence<'_>) -> RuleResult {
    let rule = RuleKind::DemoPresence;
    if !rules.require_demo {
        return RuleResult::new(rule, Outcome::NotApplicable, "demo not required");
    }
    match find_demo(evidence) {
        Some(found) => RuleResult::new(rule, Outcome::Pass, found),
        None => RuleResult::new(rule, Outcome::Fail, "no demo, screenshot, or video found"),
    }
}

fn find_demo(evidence: &EligibilityEvidence<'_>) -> Option<String> {
    let inventory = evidence.inventory;
    for path in &inventory.file_paths {
        let lower = path.to_lowercase();
        let ext = extension(&lower).unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            return Some(format!("media file {path}"));
        }
        let named_demo = DEMO_PATH_KEYWORDS
            .iter()
            .any(|keyword| lower.contains(keyword));
        if named_demo && IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Some(format!("screenshot {path}"));
        }
    }
    if let Some(dir) = inventory.directory_paths.iter().find(|dir| {
        let name = base_name(dir).to_lowercase();
        DEMO_PATH_KEYWORDS
            .iter()
            .any(|keyword| name.starts_with(keyword))
    }) {
        return Some(format!("demo directory {dir}"));
    }
    if let Some((path, readme)) = inventory.readme() {
        let lower = readme.to_lowercase();
        if let Some(host) = DEMO_LINK_HOSTS.iter().find(|host| lower.contains(*host)) {
            return Some(format!("{host} link in {path}"));
        }
        if lower.contains("live demo") || lower.contains("demo video") {
            return Some(format!("demo link in {path}"));
        }
    }
    evidence
        .metadata
        .homepage
        .as_deref()
        .filter(|homepage| !homepage.trim().is_empty())
        .map(|homepage| format!("homepage {homepage}"))
}
