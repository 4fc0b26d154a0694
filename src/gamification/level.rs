//! Level thresholds

use serde::{Deserialize, Serialize};

/// Score contribution of each badge
pub const BADGE_WEIGHT: i64 = 50;

/// (level, minimum score, title)
const LEVELS: &[(u32, i64, &str)] = &[
    (1, 0, "Newbie Saver"),
    (2, 100, "Budget Apprentice"),
    (3, 300, "Money Manager"),
    (4, 700, "Finance Pro"),
    (5, 1500, "Wealth Master"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u32,
    pub title: String,
    pub score: i64,
    /// Score needed for the next level; `None` at the top
    pub next_level_at: Option<i64>,
}

pub fn score(coins: i64, badge_count: usize) -> i64 {
    coins.saturating_add(BADGE_WEIGHT.saturating_mul(badge_count as i64))
}

pub fn level_for_score(score: i64) -> LevelInfo {
    let index = LEVELS
        .iter()
        .rposition(|(_, min, _)| score >= *min)
        .unwrap_or(0);
    let (level, _, title) = LEVELS[index];

    LevelInfo {
        level,
        title: title.to_string(),
        score,
        next_level_at: LEVELS.get(index + 1).map(|(_, min, _)| *min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(level_for_score(0).title, "Newbie Saver");
        assert_eq!(level_for_score(99).level, 1);
        assert_eq!(level_for_score(100).title, "Budget Apprentice");
        assert_eq!(level_for_score(699).level, 3);
        assert_eq!(level_for_score(700).title, "Finance Pro");

        let top = level_for_score(10_000);
        assert_eq!(top.level, 5);
        assert_eq!(top.next_level_at, None);
    }

    #[test]
    fn test_badges_count_toward_score() {
        assert_eq!(score(60, 1), 110);
        assert_eq!(level_for_score(score(60, 1)).level, 2);
        assert_eq!(level_for_score(-5).level, 1);
    }
}
