//! Advice service
//!
//! Entry point for every question a user asks. Greetings are answered from
//! the quick-response table, long planning questions go through the
//! workflow, and everything else makes a single model call with the user's
//! financial context.

use crate::audit::compute_context_hash;
use crate::classifier::{self, is_complex, ExpenseClassification, QuestionType};
use crate::context::build_context;
use crate::llm::{CallContext, CompletionRequest, ModelGateway, Provenance};
use crate::models::{Conversation, ConversationType};
use crate::prompt;
use crate::quick_response::quick_response;
use crate::random::RandomSource;
use crate::similarity::flag_repeated_answer;
use crate::store::Store;
use crate::workflow::AdviceWorkflow;
use crate::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MAX_QUESTION_CHARS: usize = 1000;
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 50;

/// Response for advice questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub answer: String,
    pub context_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_steps: Option<Vec<String>>,
}

impl AdviceResponse {
    fn plain(answer: impl Into<String>, context_used: bool) -> Self {
        Self {
            answer: answer.into(),
            context_used,
            question_type: None,
            reasoning_steps: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseItem {
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingSummary {
    pub expense_count: usize,
    pub total_amount: Decimal,
    pub context_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingInsights {
    pub insights: String,
    pub summary: SpendingSummary,
}

pub struct AdviceService {
    store: Arc<dyn Store>,
    gateway: Arc<ModelGateway>,
    random: Arc<dyn RandomSource>,
    workflow: AdviceWorkflow,
}

impl AdviceService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<ModelGateway>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let workflow = AdviceWorkflow::new(store.clone(), gateway.clone(), random.clone());
        Self {
            store,
            gateway,
            random,
            workflow,
        }
    }

    /// Answer a question, persisting it as an `advice` conversation
    pub async fn ask(&self, user_id: Uuid, question: &str, now: DateTime<Utc>) -> AdviceResponse {
        self.respond(user_id, question, ConversationType::Advice, now).await
    }

    async fn respond(
        &self,
        user_id: Uuid,
        question: &str,
        kind: ConversationType,
        now: DateTime<Utc>,
    ) -> AdviceResponse {
        if let Some(answer) = quick_response(question) {
            info!(user_id = %user_id, "Quick response served");
            return AdviceResponse::plain(answer, false);
        }

        if is_complex(question) {
            info!(user_id = %user_id, "Complex question, running workflow");
            let outcome = self.workflow.run(user_id, question, kind, now).await;
            return AdviceResponse {
                answer: outcome.answer,
                context_used: outcome.context_used,
                question_type: Some(outcome.question_type),
                reasoning_steps: Some(outcome.reasoning_steps),
            };
        }

        self.single_call(user_id, question, kind, now).await
    }

    async fn single_call(
        &self,
        user_id: Uuid,
        question: &str,
        kind: ConversationType,
        now: DateTime<Utc>,
    ) -> AdviceResponse {
        let context = match build_context(self.store.as_ref(), user_id, now).await {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Financial context unavailable, answering without it"
                );
                Default::default()
            }
        };

        let request = CompletionRequest::new(
            prompt::system_prompt(self.random.as_ref()),
            prompt::simple_prompt(question, &context),
        );
        let reply = self
            .gateway
            .answer(&request, CallContext { user_id, question })
            .await;

        let answer = match reply.provenance {
            Provenance::Model => {
                flag_repeated_answer(self.store.as_ref(), user_id, reply.content, now).await
            }
            Provenance::Fallback => reply.content,
        };

        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            question: question.trim().to_string(),
            answer: answer.clone(),
            kind,
            metadata: json!({
                "path": "simple",
                "context": context,
                "context_hash": compute_context_hash(&context),
                "total_tokens": reply.total_tokens,
                "provenance": reply.provenance,
            }),
            created_at: now,
        };
        if let Err(e) = self.store.insert_conversation(&conversation).await {
            error!(
                user_id = %user_id,
                question = %question,
                error = %e,
                "Failed to persist conversation"
            );
        }

        AdviceResponse::plain(answer, reply.provenance == Provenance::Model)
    }

    /// Summarize a list of expenses; the answer is stored as `analysis`
    pub async fn spending_insights(
        &self,
        user_id: Uuid,
        expenses: &[ExpenseItem],
        now: DateTime<Utc>,
    ) -> SpendingInsights {
        let total_amount: Decimal = expenses.iter().map(|e| e.amount).sum();

        let mut question = String::from("Please give me an analysis of my recent spending:\n");
        for item in expenses {
            question.push_str(&format!(
                "- {}: {}{}\n",
                item.description.trim(),
                item.amount.round_dp(2),
                item.category
                    .as_deref()
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default()
            ));
        }
        question.push_str(&format!("Total: {}", total_amount.round_dp(2)));

        let response = self
            .respond(user_id, &question, ConversationType::Analysis, now)
            .await;

        SpendingInsights {
            insights: response.answer,
            summary: SpendingSummary {
                expense_count: expenses.len(),
                total_amount,
                context_used: response.context_used,
            },
        }
    }

    /// Keyword rules first, then the model, then `Other`
    pub async fn classify_expense(&self, user_id: Uuid, description: &str) -> ExpenseClassification {
        if let Some(result) = classifier::classify_by_keywords(description) {
            return result;
        }

        let categories = classifier::expense_categories();
        let (system, user) = prompt::categorize_prompt(description, &categories);
        let request = CompletionRequest::new(system, user).with_max_tokens(10);

        match self
            .gateway
            .try_complete(
                &request,
                CallContext {
                    user_id,
                    question: description,
                },
            )
            .await
        {
            Ok(completion) => match classifier::known_category(&completion.content) {
                Some(category) => ExpenseClassification::ai(category),
                None => {
                    warn!(
                        user_id = %user_id,
                        answer = %completion.content,
                        "Model returned an unknown category"
                    );
                    ExpenseClassification::default_category()
                }
            },
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Expense classification fell back to default");
                ExpenseClassification::default_category()
            }
        }
    }

    pub async fn history(&self, user_id: Uuid, limit: Option<u32>) -> Result<Vec<Conversation>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.store.recent_conversations(user_id, limit).await
    }
}
