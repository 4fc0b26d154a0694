//! Repeat-answer detection
//!
//! Similarity is the "similar text" measure: the longest common substring is
//! matched, then the pieces left and right of it are matched recursively.
//! The percentage is `2 * common / (len_a + len_b) * 100`.

use crate::store::ConversationStore;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use uuid::Uuid;

pub const SIMILARITY_THRESHOLD: f64 = 80.0;
pub const REPEAT_WINDOW_MINUTES: i64 = 10;

pub const REPEAT_DISCLAIMER: &str = "Note: this answer is very similar to advice you received a few minutes ago. Try adding details about your situation for more specific guidance.";

/// Similarity of two strings as a percentage in `[0, 100]`
pub fn similar_text_percent(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }

    common_chars(&a, &b) as f64 * 2.0 * 100.0 / total as f64
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    let mut common = 0;
    let mut pending = vec![(a, b)];

    while let Some((left, right)) = pending.pop() {
        let (pos_a, pos_b, len) = longest_common_substring(left, right);
        if len == 0 {
            continue;
        }
        common += len;
        pending.push((&left[..pos_a], &right[..pos_b]));
        pending.push((&left[pos_a + len..], &right[pos_b + len..]));
    }

    common
}

/// (start in a, start in b, length); first longest match wins
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    if a.is_empty() || b.is_empty() {
        return (0, 0, 0);
    }

    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        for j in 0..b.len() {
            row[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            if row[j + 1] > best.2 {
                best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
            }
        }
        std::mem::swap(&mut prev, &mut row);
    }

    best
}

/// True when `answer` is at least [`SIMILARITY_THRESHOLD`] similar to any
/// earlier answer
pub fn is_repeat<S: AsRef<str>>(answer: &str, previous: &[S]) -> bool {
    previous
        .iter()
        .any(|earlier| similar_text_percent(answer, earlier.as_ref()) >= SIMILARITY_THRESHOLD)
}

/// Append the disclaimer when the user got nearly the same answer recently.
/// Lookup failures leave the answer untouched.
pub async fn flag_repeated_answer<S: ConversationStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    answer: String,
    now: DateTime<Utc>,
) -> String {
    let since = now - Duration::minutes(REPEAT_WINDOW_MINUTES);

    match store.answers_since(user_id, since).await {
        Ok(previous) if is_repeat(&answer, &previous) => {
            format!("{}\n\n{}", answer, REPEAT_DISCLAIMER)
        }
        Ok(_) => answer,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Similarity check skipped");
            answer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_text_matches_reference_values() {
        // "World" vs "Word": common "Wor" + "d" = 4, 2*4/9
        let pct = similar_text_percent("World", "Word");
        assert!((pct - 88.888_888).abs() < 1e-3);

        assert_eq!(similar_text_percent("", ""), 0.0);
        assert_eq!(similar_text_percent("abc", "abc"), 100.0);
        assert_eq!(similar_text_percent("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_repeat_threshold() {
        let earlier = vec!["Set aside 20% of your income for savings each month.".to_string()];
        assert!(is_repeat(
            "Set aside 20% of your income for savings every month.",
            &earlier
        ));
        assert!(!is_repeat("Pay off the card with the highest rate first.", &earlier));
        assert!(!is_repeat::<String>("anything", &[]));
    }
}
