//! Multi-stage advice workflow for complex questions
//!
//! ANALYZE → GATHER → GENERATE → FORMAT → SAVE → COMPLETE
//!
//! Every transition is total. A failure while gathering data ends in the
//! `Error` state with a generic answer; the model stage cannot fail because
//! the gateway falls back. Persistence runs once, last, and its failure is
//! only logged.

pub mod state;

pub use state::{
    AnalyzedQuestion, FormattedAdvice, GatheredData, GeneratedAdvice, Trace, WorkflowOutcome,
    WorkflowState,
};

use crate::audit::compute_context_hash;
use crate::classifier::{detect_question_type, matched_keywords};
use crate::context::build_context;
use crate::llm::{CallContext, CompletionRequest, ModelGateway, Provenance};
use crate::models::{Conversation, ConversationType, GoalStatus};
use crate::pagination::{GoalFields, GoalFilter};
use crate::prompt;
use crate::random::RandomSource;
use crate::similarity::flag_repeated_answer;
use crate::store::Store;
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const WORKFLOW_ERROR_MESSAGE: &str =
    "Sorry, I couldn't put together advice for that right now. Please try again in a moment.";

pub struct AdviceWorkflow {
    store: Arc<dyn Store>,
    gateway: Arc<ModelGateway>,
    random: Arc<dyn RandomSource>,
}

impl AdviceWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<ModelGateway>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            gateway,
            random,
        }
    }

    /// Run every stage for one question
    pub async fn run(
        &self,
        user_id: Uuid,
        question: &str,
        kind: ConversationType,
        now: DateTime<Utc>,
    ) -> WorkflowOutcome {
        let start_time = Instant::now();
        let mut trace = Trace::new();

        info!(user_id = %user_id, "Workflow: starting");
        let mut stage = WorkflowState::AnalyzeQuestion;

        // === ANALYZE ===
        let analyzed = analyze_question(question, &mut trace);
        let question_type = analyzed.question_type;
        stage = stage.next();

        // === GATHER ===
        let gathered = match self.gather_data(user_id, analyzed, now, &mut trace).await {
            Ok(gathered) => gathered,
            Err(e) => {
                error!(
                    user_id = %user_id,
                    question = %question,
                    error = %e,
                    "Workflow: gathering data failed"
                );
                trace.push("ERROR: could not load financial data");
                return WorkflowOutcome {
                    state: WorkflowState::Error,
                    last_stage: stage,
                    answer: WORKFLOW_ERROR_MESSAGE.to_string(),
                    context_used: false,
                    question_type,
                    reasoning_steps: trace.into_steps(),
                };
            }
        };

        stage = stage.next();

        // === GENERATE ===
        let generated = self.generate_advice(user_id, gathered, now, &mut trace).await;
        stage = stage.next();

        // === FORMAT ===
        let formatted = format_response(generated, &mut trace);
        stage = stage.next();

        // === SAVE ===
        trace.push(format!("SAVE: storing {} conversation", kind));
        self.save_conversation(user_id, &formatted, kind, &trace, now).await;

        debug!(
            user_id = %user_id,
            steps = trace.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Workflow: completed"
        );

        WorkflowOutcome {
            state: stage.next(),
            last_stage: stage,
            context_used: formatted.context_used(),
            answer: formatted.answer,
            question_type,
            reasoning_steps: trace.into_steps(),
        }
    }

    async fn gather_data(
        &self,
        user_id: Uuid,
        analyzed: AnalyzedQuestion,
        now: DateTime<Utc>,
        trace: &mut Trace,
    ) -> Result<GatheredData> {
        let context = build_context(self.store.as_ref(), user_id, now).await?;
        trace.push(format!(
            "GATHER: {} transactions in the last 30 days (income {}, expenses {})",
            context.transaction_count,
            context.total_income.round_dp(2),
            context.total_expenses.round_dp(2)
        ));

        let filter = GoalFilter {
            fields: GoalFields {
                status: Some(GoalStatus::Active),
            },
            ..Default::default()
        };
        let active_goals = self.store.list_goals(user_id, &filter).await?.data;
        trace.push(format!("GATHER: {} active goals", active_goals.len()));

        Ok(GatheredData {
            analyzed,
            context,
            active_goals,
        })
    }

    async fn generate_advice(
        &self,
        user_id: Uuid,
        gathered: GatheredData,
        now: DateTime<Utc>,
        trace: &mut Trace,
    ) -> GeneratedAdvice {
        let analyzed = &gathered.analyzed;
        let request = CompletionRequest::new(
            prompt::system_prompt(self.random.as_ref()),
            prompt::workflow_prompt(
                &analyzed.question,
                analyzed.question_type,
                &gathered.context,
                &gathered.active_goals,
            ),
        );

        let mut reply = self
            .gateway
            .answer(
                &request,
                CallContext {
                    user_id,
                    question: &analyzed.question,
                },
            )
            .await;

        match reply.provenance {
            Provenance::Model => {
                trace.push(format!(
                    "GENERATE: model answer received ({} tokens)",
                    reply.total_tokens
                ));
                reply.content =
                    flag_repeated_answer(self.store.as_ref(), user_id, reply.content, now).await;
            }
            Provenance::Fallback => {
                trace.push("GENERATE: model unavailable, using fallback guidance");
            }
        }

        GeneratedAdvice { gathered, reply }
    }

    async fn save_conversation(
        &self,
        user_id: Uuid,
        formatted: &FormattedAdvice,
        kind: ConversationType,
        trace: &Trace,
        now: DateTime<Utc>,
    ) {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            question: formatted.question.clone(),
            answer: formatted.answer.clone(),
            kind,
            metadata: json!({
                "path": "workflow",
                "question_type": formatted.question_type,
                "reasoning_steps": trace.snapshot(),
                "context": formatted.context,
                "context_hash": compute_context_hash(&formatted.context),
                "total_tokens": formatted.total_tokens,
                "provenance": formatted.provenance,
            }),
            created_at: now,
        };

        if let Err(e) = self.store.insert_conversation(&conversation).await {
            error!(
                user_id = %user_id,
                question = %formatted.question,
                error = %e,
                "Workflow: failed to persist conversation"
            );
        }
    }
}

fn analyze_question(question: &str, trace: &mut Trace) -> AnalyzedQuestion {
    let question_type = detect_question_type(question);
    let keywords = matched_keywords(question, question_type);

    if keywords.is_empty() {
        trace.push(format!("ANALYZE: question classified as {}", question_type));
    } else {
        trace.push(format!(
            "ANALYZE: question classified as {} (matched: {})",
            question_type,
            keywords.join(", ")
        ));
    }

    AnalyzedQuestion {
        question: question.trim().to_string(),
        question_type,
        keywords,
    }
}

fn format_response(generated: GeneratedAdvice, trace: &mut Trace) -> FormattedAdvice {
    let GeneratedAdvice { gathered, reply } = generated;
    let answer = reply.content.trim().to_string();

    trace.push(format!(
        "FORMAT: {} answer prepared ({} characters)",
        gathered.analyzed.question_type,
        answer.chars().count()
    ));

    FormattedAdvice {
        question: gathered.analyzed.question,
        question_type: gathered.analyzed.question_type,
        answer,
        context: gathered.context,
        total_tokens: reply.total_tokens,
        provenance: reply.provenance,
    }
}
