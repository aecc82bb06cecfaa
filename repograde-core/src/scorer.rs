//! Criterion scoring: rule-table heuristics blended with optional judgments.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::{ArchitecturePattern, ClassificationSummary, FileRole};
use crate::config::ScoringConfig;
use crate::error::{AuditError, Result};
use crate::inventory::RepositoryInventory;
use crate::judge::Judgment;
use crate::manifest::DependencySet;
use crate::source::{RepoMetadata, base_name};

/// A scoring criterion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Structure, tooling, and code hygiene.
    CodeQuality,
    /// README and project documentation.
    Documentation,
    /// How complete and working the project looks.
    Functionality,
    /// Novel technology and approach.
    Innovation,
    /// Interface polish and presentation.
    UserExperience,
}

impl Criterion {
    /// Every criterion in report order.
    pub const ALL: [Criterion; 5] = [
        Criterion::CodeQuality,
        Criterion::Documentation,
        Criterion::Functionality,
        Criterion::Innovation,
        Criterion::UserExperience,
    ];

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Criterion::CodeQuality => "Code Quality",
            Criterion::Documentation => "Documentation",
            Criterion::Functionality => "Functionality",
            Criterion::Innovation => "Innovation",
            Criterion::UserExperience => "User Experience",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Criterion {
    type Err = AuditError;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "code_quality" | "quality" => Ok(Criterion::CodeQuality),
            "documentation" | "docs" => Ok(Criterion::Documentation),
            "functionality" => Ok(Criterion::Functionality),
            "innovation" => Ok(Criterion::Innovation),
            "user_experience" | "ux" => Ok(Criterion::UserExperience),
            _ => Err(AuditError::Config(format!("unknown criterion: {value}"))),
        }
    }
}

/// The score of one criterion and how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    /// Final criterion score in [0, 10].
    pub score: f64,
    /// Rule-table heuristic in [0, 10].
    pub heuristic: f64,
    /// Blended LLM judgment, when one was available.
    pub judgment: Option<f64>,
    /// Matched rules and judgment notes.
    pub rationale: String,
}

/// Per-criterion scores and their weighted aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    /// Score for every criterion.
    pub subscores: BTreeMap<Criterion, SubScore>,
    /// Weight for every criterion.
    pub weights: BTreeMap<Criterion, f64>,
    /// Weighted average in [0, 10].
    pub final_score: f64,
}

impl ScoreReport {
    /// Aggregate subscores with weights.
    ///
    /// Fails when the key sets differ or a weight is negative or not finite.
    /// A zero weight total yields a final score of zero.
    pub fn new(
        subscores: BTreeMap<Criterion, SubScore>,
        weights: BTreeMap<Criterion, f64>,
    ) -> Result<Self> {
        if !subscores.keys().eq(weights.keys()) {
            return Err(AuditError::Config(
                "weights must cover exactly the scored criteria".to_string(),
            ));
        }
        if let Some((criterion, weight)) = weights
            .iter()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(AuditError::Config(format!(
                "invalid weight {weight} for {criterion}"
            )));
        }

        let total_weight: f64 = weights.values().sum();
        let final_score = if total_weight > 0.0 {
            let weighted: f64 = subscores
                .iter()
                .map(|(criterion, sub)| sub.score * weights[criterion])
                .sum();
            (weighted / total_weight).clamp(0.0, 10.0)
        } else {
            0.0
        };

        Ok(Self {
            subscores,
            weights,
            final_score,
        })
    }
}

/// Everything a rule may inspect.
pub struct ScoringInput<'a> {
    /// Crawled inventory.
    pub inventory: &'a RepositoryInventory,
    /// Classification of the inventory.
    pub summary: &'a ClassificationSummary,
    /// Declared dependencies.
    pub dependencies: &'a DependencySet,
    /// Repository metadata, when available.
    pub metadata: Option<&'a RepoMetadata>,
    contents: Vec<String>,
    readme: Option<String>,
}

impl<'a> ScoringInput<'a> {
    /// Bundle the inputs and precompute lowercased contents.
    pub fn new(
        inventory: &'a RepositoryInventory,
        summary: &'a ClassificationSummary,
        dependencies: &'a DependencySet,
        metadata: Option<&'a RepoMetadata>,
    ) -> Self {
        Self {
            contents: inventory
                .contents()
                .map(|(_, content)| content.to_lowercase())
                .collect(),
            readme: inventory.readme().map(|(_, content)| content.to_lowercase()),
            inventory,
            summary,
            dependencies,
            metadata,
        }
    }
}

/// What a point rule checks.
pub enum Condition {
    /// A file exists at one of these lowercase paths.
    FilePresent(&'static [&'static str]),
    /// A file base name starts with one of these lowercase prefixes.
    FileNameMatches(&'static [&'static str]),
    /// A directory with one of these lowercase base names exists.
    DirectoryPresent(&'static [&'static str]),
    /// Points are awarded per matched dependency up to `cap`.
    DependencyPresent {
        /// Dependency names.
        names: &'static [&'static str],
        /// Maximum points for the rule.
        cap: f64,
    },
    /// Any fetched file contains one of these lowercase needles.
    ContentContains(&'static [&'static str]),
    /// The README contains one of these lowercase needles.
    ReadmeContains(&'static [&'static str]),
    /// Predicate over repository metadata; false when metadata is missing.
    Metadata(fn(&RepoMetadata) -> bool),
    /// Predicate over the classification summary.
    Summary(fn(&ClassificationSummary) -> bool),
    /// Predicate over the full scoring input.
    Custom(fn(&ScoringInput) -> bool),
}

/// A rule awarding points when its condition holds.
pub struct PointRule {
    /// Identifier reported in rationales.
    pub id: &'static str,
    /// Points awarded (per match for dependency rules).
    pub points: f64,
    /// Condition.
    pub condition: Condition,
}

impl PointRule {
    /// Points awarded for this input, or `None` when the rule does not match.
    pub fn award(&self, input: &ScoringInput) -> Option<f64> {
        let inventory = input.inventory;
        let matched = match &self.condition {
            Condition::FilePresent(paths) => inventory
                .file_paths
                .iter()
                .any(|path| paths.contains(&path.to_lowercase().as_str())),
            Condition::FileNameMatches(prefixes) => inventory.file_paths.iter().any(|path| {
                let name = base_name(path).to_lowercase();
                prefixes.iter().any(|prefix| name.starts_with(prefix))
            }),
            Condition::DirectoryPresent(names) => inventory.directory_paths.iter().any(|path| {
                let name = base_name(path).to_lowercase();
                names.contains(&name.as_str())
            }),
            Condition::DependencyPresent { names, cap } => {
                let count = names
                    .iter()
                    .filter(|name| input.dependencies.has(name))
                    .count();
                if count == 0 {
                    return None;
                }
                return Some((count as f64 * self.points).min(*cap));
            }
            Condition::ContentContains(needles) => input
                .contents
                .iter()
                .any(|content| needles.iter().any(|needle| content.contains(needle))),
            Condition::ReadmeContains(needles) => input
                .readme
                .as_ref()
                .is_some_and(|readme| needles.iter().any(|needle| readme.contains(needle))),
            Condition::Metadata(predicate) => input.metadata.is_some_and(predicate),
            Condition::Summary(predicate) => predicate(input.summary),
            Condition::Custom(predicate) => predicate(input),
        };
        matched.then_some(self.points)
    }
}

/// Rule table for one criterion.
pub struct CriterionRules {
    /// Criterion scored by this table.
    pub criterion: Criterion,
    /// Raw points before any rule.
    pub base: fn(&ScoringInput) -> f64,
    /// Raw total divided by this gives the 0-10 heuristic.
    pub divisor: f64,
    /// Point rules.
    pub rules: &'static [PointRule],
}

impl CriterionRules {
    /// Heuristic score and the ids of the rules that matched.
    pub fn evaluate(&self, input: &ScoringInput) -> (f64, Vec<&'static str>) {
        let mut raw = (self.base)(input);
        let mut matched = Vec::new();
        for rule in self.rules {
            if let Some(points) = rule.award(input) {
                raw += points;
                matched.push(rule.id);
            }
        }
        ((raw / self.divisor).clamp(0.0, 10.0), matched)
    }
}

/// Computes criterion scores from rule tables and optional judgments.
pub struct Scorer {
    config: ScoringConfig,
    tables: &'static [CriterionRules],
}

impl Scorer {
    /// Create a scorer with the built-in rule tables.
    ///
    /// Fails when a weight is missing, negative, or not finite, or when the
    /// judgment blend lies outside [0, 1].
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tables: CRITERION_RULES,
        })
    }

    /// Scoring configuration in use.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Heuristic scores for every criterion.
    pub fn heuristics(
        &self,
        input: &ScoringInput,
    ) -> BTreeMap<Criterion, (f64, Vec<&'static str>)> {
        self.tables
            .iter()
            .map(|table| (table.criterion, table.evaluate(input)))
            .collect()
    }

    /// Score every criterion and aggregate them with the configured weights.
    pub fn score(
        &self,
        input: &ScoringInput,
        judgments: &BTreeMap<Criterion, Judgment>,
    ) -> Result<ScoreReport> {
        let blend = self.config.judgment_blend;
        let subscores = self
            .heuristics(input)
            .into_iter()
            .map(|(criterion, (heuristic, matched))| {
                let mut rationale = if matched.is_empty() {
                    "no rules matched".to_string()
                } else {
                    format!("matched: {}", matched.join(", "))
                };
                let judgment = judgments.get(&criterion);
                let score = match judgment {
                    Some(judgment) => {
                        rationale.push_str(&format!("; judgment: {}", judgment.explanation));
                        heuristic * (1.0 - blend) + judgment.score * blend
                    }
                    None => heuristic,
                };
                let sub = SubScore {
                    score: score.clamp(0.0, 10.0),
                    heuristic,
                    judgment: judgment.map(|judgment| judgment.score),
                    rationale,
                };
                (criterion, sub)
            })
            .collect();
        ScoreReport::new(subscores, self.config.weights.clone())
    }
}

fn zero(_: &ScoringInput) -> f64 {
    0.0
}

fn quality_base(input: &ScoringInput) -> f64 {
    input.summary.quality.mean() * 8.0
}

fn innovation_base(_: &ScoringInput) -> f64 {
    20.0
}

fn has_entry_point(summary: &ClassificationSummary) -> bool {
    summary
        .key_files
        .iter()
        .any(|key| key.role == FileRole::EntryPoint)
}

fn has_extension(summary: &ClassificationSummary, extensions: &[&str]) -> bool {
    extensions
        .iter()
        .any(|ext| summary.file_type_counts.contains_key(*ext))
}

fn metric_matched(summary: &ClassificationSummary, metric: &str, rule: &str) -> bool {
    summary
        .quality
        .entries()
        .iter()
        .any(|(name, entry)| *name == metric && entry.matched.iter().any(|id| id == rule))
}

const FRAMEWORKS: &[&str] = &[
    "express",
    "fastify",
    "koa",
    "@nestjs/core",
    "next",
    "react",
    "vue",
    "svelte",
    "@angular/core",
    "django",
    "flask",
    "fastapi",
    "rails",
    "spring-boot-starter-web",
    "gin",
    "echo",
    "fiber",
    "actix-web",
    "axum",
    "rocket",
];

const DATA_STORES: &[&str] = &[
    "mongoose",
    "mongodb",
    "prisma",
    "@prisma/client",
    "sequelize",
    "typeorm",
    "pg",
    "mysql2",
    "sqlalchemy",
    "psycopg2",
    "pymongo",
    "redis",
    "sqlx",
    "diesel",
    "gorm",
    "firebase",
    "@supabase/supabase-js",
];

/// Built-in rule tables, one per criterion.
pub static CRITERION_RULES: &[CriterionRules] = &[
    CriterionRules {
        criterion: Criterion::CodeQuality,
        base: quality_base,
        divisor: 10.0,
        rules: &[
            PointRule {
                id: "linter",
                points: 5.0,
                condition: Condition::Summary(|summary| {
                    metric_matched(summary, "maintainability", "linter-config")
                }),
            },
            PointRule {
                id: "formatter",
                points: 5.0,
                condition: Condition::Summary(|summary| {
                    metric_matched(summary, "readability", "formatter-config")
                }),
            },
            PointRule {
                id: "tests",
                points: 5.0,
                condition: Condition::Summary(|summary| summary.counts.test_files > 0),
            },
            PointRule {
                id: "ci",
                points: 5.0,
                condition: Condition::DirectoryPresent(&["workflows", ".circleci"]),
            },
            PointRule {
                id: "typed",
                points: 5.0,
                condition: Condition::Summary(|summary| {
                    has_extension(summary, &["ts", "tsx", "rs", "go", "java", "kt"])
                        || metric_matched(summary, "maintainability", "type-checking")
                }),
            },
        ],
    },
    CriterionRules {
        criterion: Criterion::Documentation,
        base: zero,
        divisor: 10.0,
        rules: &[
            PointRule {
                id: "readme",
                points: 25.0,
                condition: Condition::FileNameMatches(&["readme"]),
            },
            PointRule {
                id: "detailed-readme",
                points: 15.0,
                condition: Condition::Custom(|input| {
                    input.readme.as_ref().is_some_and(|readme| readme.len() >= 1500)
                }),
            },
            PointRule {
                id: "installation-guide",
                points: 10.0,
                condition: Condition::ReadmeContains(&[
                    "install",
                    "getting started",
                    "setup",
                    "quick start",
                ]),
            },
            PointRule {
                id: "usage-guide",
                points: 10.0,
                condition: Condition::ReadmeContains(&["usage", "example", "how to use", "```"]),
            },
            PointRule {
                id: "docs-directory",
                points: 10.0,
                condition: Condition::DirectoryPresent(&["docs", "doc", "documentation"]),
            },
            PointRule {
                id: "license",
                points: 10.0,
                condition: Condition::FileNameMatches(&["license", "licence", "copying"]),
            },
            PointRule {
                id: "contributing",
                points: 5.0,
                condition: Condition::FileNameMatches(&["contributing"]),
            },
            PointRule {
                id: "changelog",
                points: 5.0,
                condition: Condition::FileNameMatches(&["changelog", "history.md"]),
            },
            PointRule {
                id: "code-comments",
                points: 5.0,
                condition: Condition::Summary(|summary| {
                    metric_matched(summary, "readability", "commented-code")
                }),
            },
            PointRule {
                id: "api-docs",
                points: 5.0,
                condition: Condition::FileNameMatches(&["openapi", "swagger"]),
            },
            PointRule {
                id: "description",
                points: 5.0,
                condition: Condition::Metadata(|metadata| {
                    metadata
                        .description
                        .as_deref()
                        .is_some_and(|text| !text.trim().is_empty())
                }),
            },
        ],
    },
    CriterionRules {
        criterion: Criterion::Functionality,
        base: zero,
        divisor: 10.0,
        rules: &[
            PointRule {
                id: "entry-point",
                points: 15.0,
                condition: Condition::Summary(has_entry_point),
            },
            PointRule {
                id: "code-volume",
                points: 10.0,
                condition: Condition::Summary(|summary| summary.counts.code_files >= 10),
            },
            PointRule {
                id: "large-code-volume",
                points: 10.0,
                condition: Condition::Summary(|summary| summary.counts.code_files >= 40),
            },
            PointRule {
                id: "tests",
                points: 15.0,
                condition: Condition::Summary(|summary| summary.counts.test_files > 0),
            },
            PointRule {
                id: "declared-dependencies",
                points: 10.0,
                condition: Condition::Custom(|input| !input.dependencies.is_empty()),
            },
            PointRule {
                id: "frameworks",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: FRAMEWORKS,
                    cap: 15.0,
                },
            },
            PointRule {
                id: "api-routes",
                points: 10.0,
                condition: Condition::ContentContains(&[
                    "app.get(",
                    "app.post(",
                    "router.get(",
                    "@app.route",
                    "@app.get",
                    "@router.",
                    "@getmapping",
                    "@postmapping",
                    "#[get(",
                    "http.handlefunc",
                ]),
            },
            PointRule {
                id: "data-store",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: DATA_STORES,
                    cap: 10.0,
                },
            },
            PointRule {
                id: "run-scripts",
                points: 5.0,
                condition: Condition::Custom(|input| {
                    input.dependencies.has_script("start")
                        || input.dependencies.has_script("build")
                        || input.dependencies.has_script("dev")
                }),
            },
            PointRule {
                id: "containerised",
                points: 5.0,
                condition: Condition::FileNameMatches(&[
                    "dockerfile",
                    "docker-compose",
                    "compose.",
                ]),
            },
            PointRule {
                id: "ci",
                points: 5.0,
                condition: Condition::DirectoryPresent(&["workflows", ".circleci"]),
            },
        ],
    },
    CriterionRules {
        criterion: Criterion::Innovation,
        base: innovation_base,
        divisor: 10.0,
        rules: &[
            PointRule {
                id: "ai-ml",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: &[
                        "openai",
                        "anthropic",
                        "@anthropic-ai/sdk",
                        "langchain",
                        "llama-index",
                        "transformers",
                        "torch",
                        "tensorflow",
                        "@tensorflow/tfjs",
                        "scikit-learn",
                        "huggingface_hub",
                        "onnxruntime",
                    ],
                    cap: 20.0,
                },
            },
            PointRule {
                id: "web3",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: &[
                        "ethers",
                        "web3",
                        "hardhat",
                        "viem",
                        "wagmi",
                        "@solana/web3.js",
                    ],
                    cap: 15.0,
                },
            },
            PointRule {
                id: "realtime",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: &["socket.io", "socket.io-client", "ws", "websockets", "pusher-js"],
                    cap: 10.0,
                },
            },
            PointRule {
                id: "uncommon-language",
                points: 10.0,
                condition: Condition::Summary(|summary| {
                    ["Rust", "Go", "Elixir", "Haskell", "Solidity", "Zig", "Kotlin", "Dart"]
                        .iter()
                        .any(|language| summary.language_stats.contains_key(*language))
                }),
            },
            PointRule {
                id: "distributed-architecture",
                points: 10.0,
                condition: Condition::Summary(|summary| {
                    matches!(
                        summary.architecture,
                        Some(ArchitecturePattern::Microservices | ArchitecturePattern::Monorepo)
                    )
                }),
            },
            PointRule {
                id: "design-patterns",
                points: 10.0,
                condition: Condition::Summary(|summary| summary.design_patterns.len() >= 3),
            },
            PointRule {
                id: "novel-web-apis",
                points: 10.0,
                condition: Condition::ContentContains(&[
                    "webgl",
                    "three.js",
                    "from 'three'",
                    "webrtc",
                    "navigator.gpu",
                    "speechrecognition",
                    "webassembly",
                ]),
            },
            PointRule {
                id: "topics",
                points: 5.0,
                condition: Condition::Metadata(|metadata| metadata.topics.len() >= 3),
            },
            PointRule {
                id: "community-interest",
                points: 5.0,
                condition: Condition::Metadata(|metadata| metadata.stargazers_count >= 10),
            },
        ],
    },
    CriterionRules {
        criterion: Criterion::UserExperience,
        base: zero,
        divisor: 10.0,
        rules: &[
            PointRule {
                id: "ui-framework",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: &[
                        "react",
                        "vue",
                        "svelte",
                        "@angular/core",
                        "next",
                        "nuxt",
                        "solid-js",
                        "react-native",
                        "expo",
                    ],
                    cap: 15.0,
                },
            },
            PointRule {
                id: "styling",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: &[
                        "tailwindcss",
                        "styled-components",
                        "@mui/material",
                        "bootstrap",
                        "sass",
                        "@chakra-ui/react",
                        "antd",
                        "@emotion/react",
                    ],
                    cap: 10.0,
                },
            },
            PointRule {
                id: "stylesheets",
                points: 10.0,
                condition: Condition::Summary(|summary| {
                    has_extension(summary, &["css", "scss", "sass", "less"])
                }),
            },
            PointRule {
                id: "components",
                points: 10.0,
                condition: Condition::DirectoryPresent(&["components"]),
            },
            PointRule {
                id: "accessibility",
                points: 10.0,
                condition: Condition::ContentContains(&["aria-", "alt=", "role="]),
            },
            PointRule {
                id: "responsive-design",
                points: 10.0,
                condition: Condition::ContentContains(&[
                    "@media",
                    "name=\"viewport\"",
                    "sm:",
                    "md:",
                ]),
            },
            PointRule {
                id: "demo-assets",
                points: 10.0,
                condition: Condition::DirectoryPresent(&[
                    "screenshots",
                    "demo",
                    "assets",
                    "images",
                ]),
            },
            PointRule {
                id: "homepage",
                points: 10.0,
                condition: Condition::Metadata(|metadata| {
                    metadata
                        .homepage
                        .as_deref()
                        .is_some_and(|url| !url.trim().is_empty())
                }),
            },
            PointRule {
                id: "readme-visuals",
                points: 10.0,
                condition: Condition::ReadmeContains(&["![", "<img"]),
            },
            PointRule {
                id: "error-handling",
                points: 5.0,
                condition: Condition::ContentContains(&[
                    "catch (",
                    "except ",
                    "errorboundary",
                    "try {",
                ]),
            },
            PointRule {
                id: "cli-ergonomics",
                points: 5.0,
                condition: Condition::DependencyPresent {
                    names: &["clap", "click", "typer", "commander", "yargs", "cobra", "rich"],
                    cap: 10.0,
                },
            },
        ],
    },
];
