//! Prompt construction for the advice paths

use crate::classifier::QuestionType;
use crate::context::FinancialContext;
use crate::models::Goal;
use crate::random::RandomSource;

const SYSTEM_PROMPTS: &[&str] = &[
    r#"You are TakaTrack, a friendly personal finance assistant.

Guidelines:
- Ground your advice in the user's own numbers when they are provided
- Give concrete next steps, not general theory
- Keep answers under 200 words
- Never promise investment returns"#,
    r#"You are a supportive money coach inside the TakaTrack app.

Guidelines:
- Use the user's recent income and spending to tailor the answer
- Be encouraging and practical
- Prefer short paragraphs or a brief list
- Avoid jargon"#,
    r#"You are a careful advisor for everyday budgeting and saving.

Guidelines:
- Reference the user's data when it is relevant
- Point out one or two changes with the biggest impact
- Be concise and specific
- Do not recommend individual securities"#,
];

/// Pick one of the system prompt variants
pub fn system_prompt(random: &dyn RandomSource) -> &'static str {
    let index = random.next_below(SYSTEM_PROMPTS.len() as u32) as usize;
    SYSTEM_PROMPTS[index.min(SYSTEM_PROMPTS.len() - 1)]
}

/// Single-call prompt: context followed by the question
pub fn simple_prompt(question: &str, context: &FinancialContext) -> String {
    format!("{}\nQuestion: {}", context.prompt_section(), question.trim())
}

/// Workflow prompt: adds the detected focus and the user's active goals
pub fn workflow_prompt(
    question: &str,
    question_type: QuestionType,
    context: &FinancialContext,
    goals: &[Goal],
) -> String {
    let mut out = context.prompt_section();

    if !goals.is_empty() {
        out.push_str("Active savings goals:\n");
        for goal in goals {
            out.push_str(&format!(
                "- {}: {} of {} saved{}\n",
                goal.name,
                goal.current_amount.round_dp(2),
                goal.target_amount.round_dp(2),
                goal.deadline
                    .map(|d| format!(", due {}", d))
                    .unwrap_or_default()
            ));
        }
    }

    out.push_str(&format!(
        "\nThis is a {} question. Focus on {}. Structure the answer as a short assessment followed by numbered action steps.\n\nQuestion: {}",
        question_type.as_str().replace('_', " "),
        question_type.focus(),
        question.trim()
    ));
    out
}

/// Expense categorization prompt; the model must answer with one name
pub fn categorize_prompt(description: &str, categories: &[&str]) -> (String, String) {
    let system = format!(
        "You categorize personal expenses. Reply with exactly one of these category names and nothing else: {}.",
        categories.join(", ")
    );
    (system, format!("Expense: {}", description.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;

    #[test]
    fn test_system_prompt_variants_are_selectable() {
        let first = system_prompt(&FixedRandom(0));
        let second = system_prompt(&FixedRandom(1));
        assert_ne!(first, second);
        assert_eq!(system_prompt(&FixedRandom(3)), first);
    }

    #[test]
    fn test_workflow_prompt_mentions_focus() {
        let prompt = workflow_prompt(
            " How should I plan? ",
            QuestionType::GoalPlanning,
            &FinancialContext::default(),
            &[],
        );
        assert!(prompt.contains("goal planning question"));
        assert!(prompt.ends_with("Question: How should I plan?"));
    }
}
