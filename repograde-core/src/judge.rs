//! Qualitative criterion judgments from a chat-completion service.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassificationSummary;
use crate::config::LlmSettings;
use crate::error::{AuditError, Result};
use crate::languages::format_language_stats;
use crate::scorer::Criterion;
use crate::source::RepoMetadata;

const NEUTRAL_SCORE: f64 = 5.0;
const README_EXCERPT_CHARS: usize = 2_000;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Return the assistant's reply to the conversation.
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiCompletion {
    api_url: String,
    api_key: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletion")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiCompletion {
    /// Build a client for the configured endpoint.
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);
        let request = CompletionRequest {
            model,
            messages,
            temperature: 0.2,
            max_tokens: 400,
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AuditError::Network(format!("completion request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                AuditError::RateLimited(body)
            } else {
                AuditError::Http {
                    status: status.as_u16(),
                    message: body,
                }
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|err| AuditError::Decode(format!("completion response: {err}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AuditError::Decode("completion response had no content".to_string()))
    }
}

/// A criterion judgment on the 1-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Score in [1, 10].
    pub score: f64,
    /// Model reply, or why the neutral score was used.
    pub explanation: String,
    /// Whether the neutral score stands in for a failed call.
    pub fallback: bool,
}

impl Judgment {
    fn neutral(reason: String) -> Self {
        Self {
            score: NEUTRAL_SCORE,
            explanation: reason,
            fallback: true,
        }
    }
}

/// What the judge sees about a repository.
#[derive(Debug, Clone, Copy)]
pub struct JudgeContext<'a> {
    /// `owner/repo`.
    pub name: &'a str,
    /// Host metadata, when available.
    pub metadata: Option<&'a RepoMetadata>,
    /// Structural summary.
    pub summary: &'a ClassificationSummary,
    /// README text, when fetched.
    pub readme: Option<&'a str>,
}

/// Asks a completion service for a score per criterion, time-boxed.
pub struct Judge {
    service: Box<dyn CompletionService>,
    model: String,
    timeout: Duration,
}

impl Judge {
    /// Create a judge over any completion service.
    pub fn new(
        service: Box<dyn CompletionService>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            model: model.into(),
            timeout,
        }
    }

    /// Create a judge backed by the chat-completions API.
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(
            Box::new(OpenAiCompletion::new(settings)),
            settings.model.clone(),
            settings.timeout,
        )
    }

    /// Request a completion, failing with `Timeout` once the budget is spent.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let call = self.service.complete(messages, &self.model);
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                AuditError::Timeout(format!("completion after {}s", self.timeout.as_secs_f64()))
            })?
    }

    /// Judge one criterion. Failures and timeouts yield the neutral score.
    pub async fn judge(&self, criterion: Criterion, context: &JudgeContext<'_>) -> Judgment {
        let messages = build_messages(criterion, context);
        match self.complete(&messages).await {
            Ok(reply) => {
                let score = extract_score(&reply);
                debug!("{criterion} judgment for {}: {score}", context.name);
                Judgment {
                    score,
                    explanation: reply.trim().to_string(),
                    fallback: false,
                }
            }
            Err(err) => {
                warn!("{criterion} judgment for {} failed: {err}", context.name);
                Judgment::neutral(format!("judgment unavailable ({err}); neutral score used"))
            }
        }
    }

    /// Judge every criterion in turn.
    pub async fn judge_all(&self, context: &JudgeContext<'_>) -> BTreeMap<Criterion, Judgment> {
        let mut judgments = BTreeMap::new();
        for criterion in Criterion::ALL {
            judgments.insert(criterion, self.judge(criterion, context).await);
        }
        judgments
    }
}

fn criterion_focus(criterion: Criterion) -> &'static str {
    match criterion {
        Criterion::CodeQuality => {
            "code organisation, naming, tooling, tests, and maintainability"
        }
        Criterion::Documentation => "README quality, setup instructions, and usage guidance",
        Criterion::Functionality => "how complete and working the project appears",
        Criterion::Innovation => "originality of the idea and of the technology used",
        Criterion::UserExperience => "interface polish, accessibility, and presentation",
    }
}

/// Build the system and user prompt for one criterion.
pub fn build_messages(criterion: Criterion, context: &JudgeContext<'_>) -> Vec<ChatMessage> {
    let system = format!(
        "You are an experienced hackathon judge. Rate the repository's {} ({}) on a scale \
         from 1 to 10. Start your answer with \"Score: N/10\" and follow with two or three \
         sentences of justification.",
        criterion.label().to_lowercase(),
        criterion_focus(criterion)
    );

    let summary = context.summary;
    let mut user = String::new();
    let _ = writeln!(user, "Repository: {}", context.name);
    if let Some(description) = context.metadata.and_then(|meta| meta.description.as_deref()) {
        let _ = writeln!(user, "Description: {description}");
    }
    if let Some(architecture) = summary.architecture {
        let _ = writeln!(user, "Architecture: {architecture:?}");
    }
    let languages: Vec<String> = format_language_stats(&summary.language_stats)
        .into_iter()
        .take(5)
        .map(|(language, percent)| format!("{language} {percent:.1}%"))
        .collect();
    if !languages.is_empty() {
        let _ = writeln!(user, "Languages: {}", languages.join(", "));
    }
    let _ = writeln!(
        user,
        "Files: {} total, {} source, {} test, {} documentation",
        summary.counts.total_files,
        summary.counts.code_files,
        summary.counts.test_files,
        summary.counts.doc_files
    );
    if !summary.design_patterns.is_empty() {
        let patterns: Vec<String> = summary
            .design_patterns
            .iter()
            .map(|pattern| format!("{pattern:?}"))
            .collect();
        let _ = writeln!(user, "Design patterns: {}", patterns.join(", "));
    }
    let key_files: Vec<&str> = summary
        .key_files
        .iter()
        .map(|key| key.path.as_str())
        .take(15)
        .collect();
    if !key_files.is_empty() {
        let _ = writeln!(user, "Key files: {}", key_files.join(", "));
    }
    match context.readme {
        Some(readme) => {
            let excerpt: String = readme.chars().take(README_EXCERPT_CHARS).collect();
            let _ = writeln!(user, "\nREADME excerpt:\n{excerpt}");
        }
        None => {
            let _ = writeln!(user, "\nNo README was found.");
        }
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

static FRACTION_SCORE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*10\b").ok());
static LABELLED_SCORE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)score\s*[:=]?\s*(\d+(?:\.\d+)?)").ok());

const SENTIMENT_SCORES: &[(&str, f64)] = &[
    ("exceptional", 9.0),
    ("outstanding", 9.0),
    ("excellent", 9.0),
    ("very good", 8.0),
    ("impressive", 8.0),
    ("strong", 7.0),
    ("good", 7.0),
    ("solid", 7.0),
    ("decent", 6.0),
    ("average", 5.0),
    ("adequate", 5.0),
    ("mediocre", 4.0),
    ("weak", 3.0),
    ("poor", 3.0),
    ("lacking", 3.0),
    ("terrible", 1.0),
];

/// Extract a 1-10 score from free text.
///
/// Tries `N/10`, then `Score: N`, then the sentiment table, then falls back
/// to the neutral score.
pub fn extract_score(text: &str) -> f64 {
    let captured = |pattern: &LazyLock<Option<Regex>>| -> Option<f64> {
        let regex = pattern.as_ref()?;
        regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
            .find(|value| (0.0..=10.0).contains(value))
    };

    if let Some(score) = captured(&FRACTION_SCORE).or_else(|| captured(&LABELLED_SCORE)) {
        return score.clamp(1.0, 10.0);
    }

    let lower = text.to_lowercase();
    SENTIMENT_SCORES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, score)| *score)
        .unwrap_or(NEUTRAL_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(url: String) -> LlmSettings {
        LlmSettings {
            api_url: url,
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn context(summary: &ClassificationSummary) -> JudgeContext<'_> {
        JudgeContext {
            name: "octo/demo",
            metadata: None,
            summary,
            readme: Some("# Demo\nDoes things."),
        }
    }

    #[test]
    fn extracts_fraction_before_label() {
        assert_eq!(extract_score("Score: 7 overall, I'd say 8/10"), 8.0);
        assert_eq!(extract_score("Rating 6.5 / 10"), 6.5);
    }

    #[test]
    fn extracts_labelled_score() {
        assert_eq!(extract_score("Score: 4. Needs work."), 4.0);
        assert_eq!(extract_score("score=9"), 9.0);
    }

    #[test]
    fn falls_back_to_sentiment_then_neutral() {
        assert_eq!(extract_score("An excellent submission."), 9.0);
        assert_eq!(extract_score("Very good structure overall."), 8.0);
        assert_eq!(extract_score("The docs are poor."), 3.0);
        assert_eq!(extract_score("No opinion."), 5.0);
    }

    #[test]
    fn out_of_range_numbers_are_ignored() {
        assert_eq!(extract_score("42/10 is not a score, but Score: 6 is"), 6.0);
        assert_eq!(extract_score("Score: 0/10"), 1.0);
    }

    #[test]
    fn prompt_mentions_criterion_and_readme() {
        let summary = ClassificationSummary::default();
        let messages = build_messages(Criterion::Documentation, &context(&summary));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("documentation"));
        assert!(messages[1].content.contains("octo/demo"));
        assert!(messages[1].content.contains("Does things."));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let client = OpenAiCompletion::new(&settings("http://localhost".to_string()));
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-key"));
    }

    #[tokio::test]
    async fn judge_parses_service_reply() {
        let mut service = MockCompletionService::new();
        service
            .expect_complete()
            .withf(|messages, model| messages.len() == 2 && model == "test-model")
            .times(1)
            .returning(|_, _| Ok("Score: 8/10. Clear structure.".to_string()));
        let judge = Judge::new(Box::new(service), "test-model", Duration::from_secs(1));

        let summary = ClassificationSummary::default();
        let judgment = judge.judge(Criterion::CodeQuality, &context(&summary)).await;
        assert_eq!(judgment.score, 8.0);
        assert!(!judgment.fallback);
        assert!(judgment.explanation.contains("Clear structure"));
    }

    #[tokio::test]
    async fn judge_falls_back_on_service_error() {
        let mut service = MockCompletionService::new();
        service
            .expect_complete()
            .times(5)
            .returning(|_, _| Err(AuditError::Network("offline".to_string())));
        let judge = Judge::new(Box::new(service), "test-model", Duration::from_secs(1));

        let summary = ClassificationSummary::default();
        let judgments = judge.judge_all(&context(&summary)).await;
        assert_eq!(judgments.len(), 5);
        for judgment in judgments.values() {
            assert_eq!(judgment.score, 5.0);
            assert!(judgment.fallback);
            assert!(judgment.explanation.contains("offline"));
        }
    }

    struct SlowService;

    #[async_trait]
    impl CompletionService for SlowService {
        async fn complete(&self, _: &[ChatMessage], _: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("Score: 10/10".to_string())
        }
    }

    #[tokio::test]
    async fn judge_falls_back_on_timeout() {
        let judge = Judge::new(Box::new(SlowService), "test-model", Duration::from_millis(20));
        let summary = ClassificationSummary::default();
        let judgment = judge.judge(Criterion::Innovation, &context(&summary)).await;
        assert_eq!(judgment.score, 5.0);
        assert!(judgment.fallback);
        assert!(judgment.explanation.contains("timed out"));
    }

    #[tokio::test]
    async fn slow_completion_is_a_timeout_error() {
        let judge = Judge::new(Box::new(SlowService), "test-model", Duration::from_millis(20));
        let err = judge
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        match err {
            AuditError::Timeout(message) => assert!(message.contains("completion after")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn openai_completion_posts_chat_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{"model": "test-model"}"#);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "choices": [{"message": {"role": "assistant", "content": "Score: 7/10"}}]
                    }));
            })
            .await;

        let client = OpenAiCompletion::new(&settings(server.url("")));
        let reply = client
            .complete(&[ChatMessage::user("hello")], "test-model")
            .await
            .expect("reply");
        assert_eq!(reply, "Score: 7/10");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn openai_completion_maps_error_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("upstream down");
            })
            .await;

        let client = OpenAiCompletion::new(&settings(server.url("")));
        let err = client
            .complete(&[ChatMessage::user("hello")], "test-model")
            .await
            .unwrap_err();
        match err {
            AuditError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn openai_completion_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"choices": []}));
            })
            .await;

        let client = OpenAiCompletion::new(&settings(server.url("")));
        let err = client
            .complete(&[ChatMessage::user("hello")], "test-model")
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Decode(_)));
    }
}
