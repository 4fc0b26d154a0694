//! Daily spin prize table

use crate::random::RandomSource;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpinPrize {
    pub code: &'static str,
    pub label: &'static str,
    pub coins: i64,
    pub weight: u32,
}

/// Code of the prize that grants the lucky badge on claim
pub const LUCKY_BADGE_PRIZE: &str = "badge_lucky";
pub const LUCKY_BADGE_CODE: &str = "lucky";
/// Claiming this prize banks one streak freeze
pub const STREAK_FREEZE_PRIZE: &str = "streak_freeze";

pub const SPIN_TABLE: &[SpinPrize] = &[
    SpinPrize { code: "coins_10", label: "10 coins", coins: 10, weight: 40 },
    SpinPrize { code: "coins_25", label: "25 coins", coins: 25, weight: 25 },
    SpinPrize { code: "coins_50", label: "50 coins", coins: 50, weight: 15 },
    SpinPrize { code: "coins_100", label: "100 coins", coins: 100, weight: 8 },
    SpinPrize { code: STREAK_FREEZE_PRIZE, label: "Streak freeze", coins: 0, weight: 7 },
    SpinPrize { code: LUCKY_BADGE_PRIZE, label: "Lucky badge", coins: 0, weight: 5 },
];

pub fn total_weight() -> u32 {
    SPIN_TABLE.iter().map(|p| p.weight).sum()
}

/// Weighted draw
pub fn draw(random: &dyn RandomSource) -> &'static SpinPrize {
    let mut roll = random.next_below(total_weight());
    for prize in SPIN_TABLE {
        if roll < prize.weight {
            return prize;
        }
        roll -= prize.weight;
    }
    &SPIN_TABLE[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{FixedRandom, SeededRandom};
    use std::collections::HashMap;

    #[test]
    fn test_weights_sum_to_hundred() {
        assert_eq!(total_weight(), 100);
    }

    #[test]
    fn test_roll_boundaries() {
        assert_eq!(draw(&FixedRandom(0)).code, "coins_10");
        assert_eq!(draw(&FixedRandom(39)).code, "coins_10");
        assert_eq!(draw(&FixedRandom(40)).code, "coins_25");
        assert_eq!(draw(&FixedRandom(88)).code, STREAK_FREEZE_PRIZE);
        assert_eq!(draw(&FixedRandom(99)).code, LUCKY_BADGE_PRIZE);
    }

    #[test]
    fn test_distribution_roughly_follows_weights() {
        let random = SeededRandom::new(7);
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for _ in 0..10_000 {
            *counts.entry(draw(&random).code).or_default() += 1;
        }
        let common = counts["coins_10"];
        assert!((3_500..4_500).contains(&common), "coins_10 drawn {} times", common);
        assert!(counts["coins_10"] > counts[LUCKY_BADGE_PRIZE]);
    }
}
