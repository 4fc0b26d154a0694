//! Daily logging streaks

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// (streak length, badge code, bonus coins)
pub const STREAK_MILESTONES: &[(u32, &str, i64)] = &[(7, "streak_7", 50), (30, "streak_30", 200)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub current: u32,
    pub longest: u32,
    /// False when today was already logged
    pub advanced: bool,
    /// A streak freeze bridged a single missed day
    pub freeze_used: bool,
}

/// Apply one day of activity.
///
/// Logging the day after the last log extends the streak and logging the
/// same day again changes nothing. With a freeze in hand, one missed day is
/// bridged as if it had been logged. Anything else starts over at one.
pub fn advance_streak(
    current: u32,
    longest: u32,
    last_logged_on: Option<NaiveDate>,
    today: NaiveDate,
    freezes: u32,
) -> StreakUpdate {
    let yesterday = today.pred_opt();
    let day_before = yesterday.and_then(|d| d.pred_opt());

    let (next, freeze_used) = match last_logged_on {
        Some(last) if last == today => {
            return StreakUpdate {
                current,
                longest: longest.max(current),
                advanced: false,
                freeze_used: false,
            };
        }
        Some(last) if yesterday == Some(last) => (current.saturating_add(1), false),
        Some(last) if day_before == Some(last) && freezes > 0 && current > 0 => {
            (current.saturating_add(1), true)
        }
        _ => (1, false),
    };

    StreakUpdate {
        current: next,
        longest: longest.max(next),
        advanced: true,
        freeze_used,
    }
}

/// Milestones reached by a streak of this length
pub fn milestones_reached(current: u32) -> impl Iterator<Item = &'static (u32, &'static str, i64)> {
    STREAK_MILESTONES
        .iter()
        .filter(move |(days, _, _)| current >= *days)
}
