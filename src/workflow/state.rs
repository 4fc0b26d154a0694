//! Stage records for the advice workflow
//!
//! Each stage consumes the previous record and produces the next one, so a
//! later stage can never observe a half-built earlier result.

use crate::classifier::QuestionType;
use crate::context::FinancialContext;
use crate::llm::{ModelReply, Provenance};
use crate::models::Goal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    AnalyzeQuestion,
    GatherData,
    GenerateAdvice,
    FormatResponse,
    SaveConversation,
    Completed,
    Error,
}

impl WorkflowState {
    /// Stage entered after this one succeeds; terminal states stay put
    pub fn next(self) -> Self {
        match self {
            WorkflowState::AnalyzeQuestion => WorkflowState::GatherData,
            WorkflowState::GatherData => WorkflowState::GenerateAdvice,
            WorkflowState::GenerateAdvice => WorkflowState::FormatResponse,
            WorkflowState::FormatResponse => WorkflowState::SaveConversation,
            WorkflowState::SaveConversation => WorkflowState::Completed,
            WorkflowState::Completed => WorkflowState::Completed,
            WorkflowState::Error => WorkflowState::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Error)
    }
}

/// Append-only reasoning trace
#[derive(Debug, Default)]
pub struct Trace(Vec<String>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Into<String>) {
        self.0.push(step.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the steps so far
    pub fn snapshot(&self) -> Vec<String> {
        self.0.clone()
    }

    pub fn into_steps(self) -> Vec<String> {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzedQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub keywords: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct GatheredData {
    pub analyzed: AnalyzedQuestion,
    pub context: FinancialContext,
    pub active_goals: Vec<Goal>,
}

#[derive(Debug, Clone)]
pub struct GeneratedAdvice {
    pub gathered: GatheredData,
    pub reply: ModelReply,
}

#[derive(Debug, Clone)]
pub struct FormattedAdvice {
    pub question: String,
    pub question_type: QuestionType,
    pub answer: String,
    pub context: FinancialContext,
    pub total_tokens: u32,
    pub provenance: Provenance,
}

impl FormattedAdvice {
    pub fn context_used(&self) -> bool {
        self.provenance == Provenance::Model
    }
}

/// Final projection returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub state: WorkflowState,
    /// Last non-terminal stage entered before `state`
    pub last_stage: WorkflowState,
    pub answer: String,
    pub context_used: bool,
    pub question_type: QuestionType,
    pub reasoning_steps: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_only_grows() {
        let mut trace = Trace::new();
        assert!(trace.is_empty());
        trace.push("one");
        trace.push(String::from("two"));
        let snapshot = trace.snapshot();
        trace.push("three");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(trace.into_steps(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_stages_advance_in_order() {
        let mut stage = WorkflowState::AnalyzeQuestion;
        let mut seen = vec![stage];
        while !stage.is_terminal() {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[4], WorkflowState::SaveConversation);
        assert_eq!(stage, WorkflowState::Completed);
        assert_eq!(WorkflowState::Error.next(), WorkflowState::Error);
    }
}
