//! Canned answers for greetings and small talk
//!
//! Matching is exact after trimming and lowercasing. A hit never touches the
//! model API or the conversation store.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref QUICK_RESPONSES: HashMap<&'static str, &'static str> = {
        let mut table = HashMap::new();
        table.insert(
            "hi",
            "Hi! I'm your TakaTrack assistant. Ask me anything about budgeting, saving or managing debt.",
        );
        table.insert(
            "hello",
            "Hello! How can I help with your finances today?",
        );
        table.insert(
            "hey",
            "Hey! Want a hand with your budget or savings goals?",
        );
        table.insert(
            "good morning",
            "Good morning! A quick look at yesterday's spending is a great way to start the day.",
        );
        table.insert(
            "good evening",
            "Good evening! Logging today's expenses now keeps your streak going.",
        );
        table.insert(
            "how are you",
            "I'm doing well, thanks for asking! How are your finances looking this week?",
        );
        table.insert(
            "thanks",
            "You're welcome! Keep tracking and your future self will thank you.",
        );
        table.insert(
            "thank you",
            "You're welcome! Let me know if you have any other money questions.",
        );
        table.insert(
            "bye",
            "Goodbye! Remember to log your transactions to keep your streak alive.",
        );
        table.insert(
            "what can you do",
            "I can review your spending, suggest budgets, help plan savings goals and explain debt payoff strategies using your own transaction history.",
        );
        table.insert(
            "help",
            "Ask me a question such as \"How can I save more each month?\" and I'll answer using your recent income and expenses.",
        );
        table
    };
}

/// Canned answer for an exact phrase, if any
pub fn quick_response(question: &str) -> Option<&'static str> {
    let normalized = question.trim().to_lowercase();
    QUICK_RESPONSES.get(normalized.as_str()).copied()
}
