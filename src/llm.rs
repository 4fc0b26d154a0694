//! Chat-completion client and the model gateway
//!
//! `ChatCompletionClient` talks to any OpenAI-compatible endpoint with a
//! long-lived reqwest::Client. `ModelGateway` wraps a backend with a hard
//! timeout, bounded retries and a keyword fallback, so callers always get an
//! answer.

use crate::config::{LlmConfig, MAX_LLM_RETRIES};
use crate::error::TrackerError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u32,
}

/// Anything that can answer a chat-completion request
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

//
// ================= HTTP client =================
//

/// Reusable chat-completion client (connection-pooled)
pub struct ChatCompletionClient {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        if self.config.api_key.is_empty() {
            return Err(TrackerError::LlmError("LLM_API_KEY not configured".to_string()));
        }

        let body = ApiRequest {
            model: &self.config.model,
            messages: &request.messages,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature.unwrap_or(self.config.temperature),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrackerError::LlmError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrackerError::LlmError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::LlmError(format!("Parse error: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| TrackerError::LlmError("Empty completion".to_string()))?;

        Ok(Completion {
            content,
            total_tokens: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u32,
}

//
// ================= Gateway =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub total_tokens: u32,
    pub provenance: Provenance,
}

impl ModelReply {
    pub fn context_used(&self) -> bool {
        self.provenance == Provenance::Model
    }
}

/// Who is asking; only used to enrich failure logs
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub user_id: Uuid,
    pub question: &'a str,
}

pub struct ModelGateway {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ModelGateway {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            backend,
            timeout,
            max_retries: max_retries.min(MAX_LLM_RETRIES),
            retry_backoff,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = ChatCompletionClient::new(config.clone())?;
        Ok(Self::new(
            Arc::new(client),
            config.timeout,
            config.max_retries,
            config.retry_backoff,
        ))
    }

    /// Call the model, retrying transient failures. Errors are returned to
    /// the caller; use [`ModelGateway::answer`] for the fallback behavior.
    pub async fn try_complete(
        &self,
        request: &CompletionRequest,
        ctx: CallContext<'_>,
    ) -> Result<Completion> {
        let attempts = self.max_retries + 1;
        let mut last_error = TrackerError::LlmError("No attempt made".to_string());

        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(self.timeout, self.backend.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(TrackerError::LlmError(format!(
                    "Timed out after {}s",
                    self.timeout.as_secs_f32()
                ))),
            };

            match outcome {
                Ok(completion) => {
                    info!(
                        user_id = %ctx.user_id,
                        attempt,
                        total_tokens = completion.total_tokens,
                        "Model response received"
                    );
                    return Ok(completion);
                }
                Err(e) => {
                    warn!(
                        user_id = %ctx.user_id,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Model call failed"
                    );
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// Always produces an answer: the model's, or the keyword fallback
    pub async fn answer(&self, request: &CompletionRequest, ctx: CallContext<'_>) -> ModelReply {
        match self.try_complete(request, ctx).await {
            Ok(completion) => ModelReply {
                content: completion.content,
                total_tokens: completion.total_tokens,
                provenance: Provenance::Model,
            },
            Err(e) => {
                error!(
                    user_id = %ctx.user_id,
                    question = %ctx.question,
                    error = %e,
                    "Model unavailable, serving fallback answer"
                );
                ModelReply {
                    content: fallback_answer(ctx.question).to_string(),
                    total_tokens: 0,
                    provenance: Provenance::Fallback,
                }
            }
        }
    }
}

/// Scanned in order; first keyword found picks the answer
const FALLBACK_RULES: &[(&[&str], &str)] = &[
    (
        &["budget"],
        "A simple way to budget is the 50/30/20 rule: about 50% of income for needs, 30% for wants and 20% for savings or debt repayment. Review your largest expense categories each month and set a limit for each one.",
    ),
    (
        &["save"],
        "Start by building an emergency fund that covers three to six months of expenses. Automating a transfer to savings right after payday makes saving consistent without relying on willpower.",
    ),
    (
        &["invest"],
        "Before investing, make sure you have an emergency fund and no high-interest debt. For most people, diversified low-cost funds held for the long term are a sensible starting point.",
    ),
    (
        &["debt"],
        "List your debts by interest rate and put any extra money toward the highest-rate balance while paying the minimum on the rest. Avoid taking on new debt while you pay balances down.",
    ),
    (
        &["financial", "money"],
        "Track every transaction for a month to see where your money goes, then set a budget and a savings goal based on what you find. Small, consistent habits make the biggest difference.",
    ),
];

const GENERIC_FALLBACK: &str = "I can't reach the advice service right now. Meanwhile, keep logging your income and expenses so the next answer can be tailored to your numbers, and try again in a moment.";

pub fn fallback_answer(question: &str) -> &'static str {
    let lowered = question.to_lowercase();
    FALLBACK_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(_, answer)| *answer)
        .unwrap_or(GENERIC_FALLBACK)
}
