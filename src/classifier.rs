//! Keyword classifiers
//!
//! Decides whether a question needs the multi-stage workflow, which kind of
//! financial question it is, and which spending category a free-text
//! expense description belongs to. All rules are ordered data tables:
//! first match wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Questions longer than this (in characters) are candidates for the workflow
pub const COMPLEX_MIN_CHARS: usize = 100;

/// Checked against the lowercased question
const COMPLEXITY_KEYWORDS: &[&str] = &[
    "strategy",
    "retirement",
    "consolidation",
    "budget",
    "plan",
    "portfolio",
    "long-term",
    "investment",
    "analysis",
    "compare",
];

/// True when the question is long and mentions a planning topic
pub fn is_complex(question: &str) -> bool {
    if question.chars().count() <= COMPLEX_MIN_CHARS {
        return false;
    }
    let lowered = question.to_lowercase();
    COMPLEXITY_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Budgeting,
    Saving,
    Debt,
    Investing,
    GoalPlanning,
    General,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Budgeting => "budgeting",
            QuestionType::Saving => "saving",
            QuestionType::Debt => "debt",
            QuestionType::Investing => "investing",
            QuestionType::GoalPlanning => "goal_planning",
            QuestionType::General => "general",
        }
    }

    /// What the advisor should concentrate on for this kind of question
    pub fn focus(&self) -> &'static str {
        match self {
            QuestionType::Budgeting => "spending limits per category and where to cut back",
            QuestionType::Saving => "building savings and an emergency fund",
            QuestionType::Debt => "paying down debt and reducing interest costs",
            QuestionType::Investing => "long-term investing suited to the user's cash flow",
            QuestionType::GoalPlanning => "reaching the user's savings goals on time",
            QuestionType::General => "overall financial health",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluated top to bottom
const QUESTION_RULES: &[(QuestionType, &[&str])] = &[
    (QuestionType::Budgeting, &["budget", "spending", "expense", "spend"]),
    (QuestionType::Saving, &["save", "saving", "savings", "emergency fund"]),
    (QuestionType::Debt, &["debt", "loan", "credit card", "pay off", "interest"]),
    (QuestionType::Investing, &["invest", "stock", "portfolio", "retirement", "mutual fund"]),
    (QuestionType::GoalPlanning, &["goal", "target", "plan"]),
];

pub fn detect_question_type(question: &str) -> QuestionType {
    let lowered = question.to_lowercase();
    QUESTION_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(kind, _)| *kind)
        .unwrap_or(QuestionType::General)
}

/// Keywords of the rule that decided the question type
pub fn matched_keywords(question: &str, kind: QuestionType) -> Vec<&'static str> {
    let lowered = question.to_lowercase();
    QUESTION_RULES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, keywords)| {
            keywords
                .iter()
                .copied()
                .filter(|kw| lowered.contains(kw))
                .collect()
        })
        .unwrap_or_default()
}

//
// ================= Expense categorization =================
//

pub const OTHER_CATEGORY: &str = "Other";

const EXPENSE_RULES: &[(&str, &[&str])] = &[
    (
        "Food & Dining",
        &[
            "restaurant", "cafe", "coffee", "lunch", "dinner", "breakfast", "food", "grocery",
            "groceries", "pizza", "burger", "snack",
        ],
    ),
    (
        "Transportation",
        &["uber", "taxi", "bus", "train", "fuel", "petrol", "gasoline", "parking", "toll", "ride"],
    ),
    (
        "Shopping",
        &["amazon", "mall", "clothes", "shoes", "shopping", "store", "shopee", "lazada"],
    ),
    (
        "Bills & Utilities",
        &["electric", "water bill", "internet", "phone", "bill", "utility", "rent", "insurance"],
    ),
    (
        "Entertainment",
        &["movie", "cinema", "netflix", "spotify", "game", "concert", "subscription"],
    ),
    (
        "Health",
        &["pharmacy", "doctor", "hospital", "medicine", "clinic", "dentist", "gym"],
    ),
    (
        "Education",
        &["book", "course", "tuition", "school", "class", "udemy"],
    ),
];

/// Every category the classifier can answer with
pub fn expense_categories() -> Vec<&'static str> {
    EXPENSE_RULES
        .iter()
        .map(|(name, _)| *name)
        .chain(std::iter::once(OTHER_CATEGORY))
        .collect()
}

/// Resolve a model answer to one of the known category names
pub fn known_category(answer: &str) -> Option<&'static str> {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '*')
        .to_lowercase();
    expense_categories()
        .into_iter()
        .find(|name| name.to_lowercase() == cleaned)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    Keyword,
    Ai,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseClassification {
    pub category: String,
    pub confidence: f32,
    pub method: ClassificationMethod,
}

impl ExpenseClassification {
    pub fn ai(category: &str) -> Self {
        Self {
            category: category.to_string(),
            confidence: 0.7,
            method: ClassificationMethod::Ai,
        }
    }

    pub fn default_category() -> Self {
        Self {
            category: OTHER_CATEGORY.to_string(),
            confidence: 0.3,
            method: ClassificationMethod::Default,
        }
    }
}

/// Keyword pass: the category with the most hits wins, earlier rules break ties
pub fn classify_by_keywords(description: &str) -> Option<ExpenseClassification> {
    let lowered = description.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for (category, keywords) in EXPENSE_RULES {
        let hits = keywords.iter().filter(|kw| lowered.contains(*kw)).count();
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((category, hits));
        }
    }

    best.map(|(category, hits)| ExpenseClassification {
        category: category.to_string(),
        confidence: (0.6 + 0.1 * hits as f32).min(0.95),
        method: ClassificationMethod::Keyword,
    })
}
