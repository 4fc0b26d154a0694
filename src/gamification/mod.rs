//! Gamification: streaks, badges, levels, daily spins and rewards
//!
//! All date-sensitive operations take `today` explicitly; handlers pass the
//! current UTC date.

pub mod level;
pub mod spin;
pub mod streak;

pub use level::{level_for_score, LevelInfo};
pub use spin::{SpinPrize, SPIN_TABLE};
pub use streak::{advance_streak, StreakUpdate, STREAK_MILESTONES};

use crate::error::TrackerError;
use crate::models::{Badge, DailySpin, Reward, UserProgress};
use crate::random::RandomSource;
use crate::store::{CheckInWrite, Store};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Coins for the first activity of each day
pub const DAILY_CHECK_IN_COINS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub progress: UserProgress,
    pub level: LevelInfo,
    pub badges: Vec<Badge>,
    pub can_spin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub already_logged_today: bool,
    pub freeze_used: bool,
    pub coins_awarded: i64,
    pub new_badges: Vec<String>,
    pub level: LevelInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinStatus {
    pub can_spin: bool,
    pub last_spin: Option<DailySpin>,
    pub prizes: Vec<SpinPrize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinOutcome {
    /// Whether another spin is allowed today (always false after spinning)
    pub can_spin: bool,
    pub spun: bool,
    pub reward: Option<Reward>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub reward: Reward,
    pub coins: i64,
    pub streak_freezes: u32,
    pub level: LevelInfo,
}

pub struct GamificationService {
    store: Arc<dyn Store>,
    random: Arc<dyn RandomSource>,
}

impl GamificationService {
    pub fn new(store: Arc<dyn Store>, random: Arc<dyn RandomSource>) -> Self {
        Self { store, random }
    }

    async fn progress(&self, user_id: Uuid) -> Result<UserProgress> {
        Ok(self
            .store
            .load_progress(user_id)
            .await?
            .unwrap_or_else(|| UserProgress::new(user_id)))
    }

    pub async fn profile(&self, user_id: Uuid, today: NaiveDate) -> Result<Profile> {
        let level = self.refresh_level(user_id).await?;
        let progress = self.progress(user_id).await?;
        let badges = self.store.list_badges(user_id).await?;
        let can_spin = self.store.spin_on(user_id, today).await?.is_none();

        Ok(Profile {
            progress,
            level,
            badges,
            can_spin,
        })
    }

    /// Record activity for `today`: extend the streak, pay the daily coins
    /// once and award any milestone badges not yet held
    pub async fn log_activity(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CheckIn> {
        let progress = self.progress(user_id).await?;
        let update = advance_streak(
            progress.current_streak,
            progress.longest_streak,
            progress.last_logged_on,
            today,
            progress.streak_freezes,
        );

        let mut coins_awarded = 0;
        let mut new_badges = Vec::new();

        let write = CheckInWrite {
            user_id,
            seen: progress.last_logged_on,
            today,
            current: update.current,
            longest: update.longest,
            freezes_used: u32::from(update.freeze_used),
            coins: DAILY_CHECK_IN_COINS,
        };

        // a concurrent request for the same user may have logged first
        let applied = update.advanced && self.store.record_check_in(&write).await?;
        if !applied {
            let current = self.progress(user_id).await?;
            debug!(user_id = %user_id, streak = current.current_streak, "Already logged today");
            return Ok(CheckIn {
                current_streak: current.current_streak,
                longest_streak: current.longest_streak,
                already_logged_today: true,
                freeze_used: false,
                coins_awarded,
                new_badges,
                level: self.refresh_level(user_id).await?,
            });
        }
        coins_awarded += DAILY_CHECK_IN_COINS;

        if update.freeze_used {
            info!(user_id = %user_id, streak = update.current, "Streak freeze used");
        }

        let mut bonus = 0;
        for &(days, code, reward) in streak::milestones_reached(update.current) {
            let badge = Badge {
                id: Uuid::new_v4(),
                user_id,
                code: code.to_string(),
                awarded_at: now,
            };
            if self.store.award_badge(&badge).await? {
                info!(user_id = %user_id, badge = %code, streak = days, "Streak badge awarded");
                bonus += reward;
                new_badges.push(code.to_string());
            }
        }
        if bonus > 0 {
            self.store.add_coins(user_id, bonus).await?;
            coins_awarded += bonus;
        }

        debug!(user_id = %user_id, streak = update.current, "Activity logged");

        Ok(CheckIn {
            current_streak: update.current,
            longest_streak: update.longest,
            already_logged_today: false,
            freeze_used: update.freeze_used,
            coins_awarded,
            new_badges,
            level: self.refresh_level(user_id).await?,
        })
    }

    /// Recompute level and title from coins and badges; writes only those two
    pub async fn refresh_level(&self, user_id: Uuid) -> Result<LevelInfo> {
        let progress = self.progress(user_id).await?;
        let badge_count = self.store.list_badges(user_id).await?.len();
        let info = level_for_score(level::score(progress.coins, badge_count));

        if info.level != progress.level || info.title != progress.title {
            self.store.save_level(user_id, info.level, &info.title).await?;
        }
        Ok(info)
    }

    pub async fn spin_status(&self, user_id: Uuid, today: NaiveDate) -> Result<SpinStatus> {
        let last_spin = self.store.spin_on(user_id, today).await?;
        Ok(SpinStatus {
            can_spin: last_spin.is_none(),
            last_spin,
            prizes: SPIN_TABLE.to_vec(),
        })
    }

    /// One spin per calendar day; a second attempt writes nothing
    pub async fn spin(&self, user_id: Uuid, today: NaiveDate, now: DateTime<Utc>) -> Result<SpinOutcome> {
        let already_spun = SpinOutcome {
            can_spin: false,
            spun: false,
            reward: None,
            message: "You have already spun today. Come back tomorrow!".to_string(),
        };

        if self.store.spin_on(user_id, today).await?.is_some() {
            return Ok(already_spun);
        }

        let prize = spin::draw(self.random.as_ref());
        let daily_spin = DailySpin {
            id: Uuid::new_v4(),
            user_id,
            spun_on: today,
            created_at: now,
        };
        let reward = Reward {
            id: Uuid::new_v4(),
            user_id,
            spin_id: Some(daily_spin.id),
            code: prize.code.to_string(),
            label: prize.label.to_string(),
            coins: prize.coins,
            created_at: now,
            claimed_at: None,
        };

        // lost race with a concurrent spin
        if !self.store.record_spin(&daily_spin, &reward).await? {
            return Ok(already_spun);
        }

        info!(user_id = %user_id, prize = %prize.code, "Daily spin");

        Ok(SpinOutcome {
            can_spin: false,
            spun: true,
            message: format!("You won {}!", prize.label),
            reward: Some(reward),
        })
    }

    pub async fn rewards(&self, user_id: Uuid) -> Result<Vec<Reward>> {
        self.store.list_rewards(user_id).await
    }

    pub async fn badges(&self, user_id: Uuid) -> Result<Vec<Badge>> {
        self.store.list_badges(user_id).await
    }

    pub async fn claim(&self, user_id: Uuid, reward_id: Uuid, now: DateTime<Utc>) -> Result<ClaimOutcome> {
        let reward = self
            .store
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Reward"))?;

        if reward.user_id != user_id {
            return Err(TrackerError::not_owner("reward"));
        }

        let freezes = u32::from(reward.code == spin::STREAK_FREEZE_PRIZE);
        let claimed = self
            .store
            .claim_reward(reward_id, now, freezes)
            .await?
            .ok_or_else(|| TrackerError::invalid("reward", "This reward has already been claimed."))?;

        if claimed.code == spin::LUCKY_BADGE_PRIZE {
            let badge = Badge {
                id: Uuid::new_v4(),
                user_id,
                code: spin::LUCKY_BADGE_CODE.to_string(),
                awarded_at: now,
            };
            self.store.award_badge(&badge).await?;
        }

        let level = self.refresh_level(user_id).await?;
        let progress = self.progress(user_id).await?;

        Ok(ClaimOutcome {
            reward: claimed,
            coins: progress.coins,
            streak_freezes: progress.streak_freezes,
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;
    use crate::store::{GamificationStore, InMemoryStore};
    use chrono::Duration;

    fn service(roll: u32) -> (GamificationService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (
            GamificationService::new(store.clone(), Arc::new(FixedRandom(roll))),
            store,
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[tokio::test]
    async fn test_second_spin_same_day_writes_nothing() {
        let (service, store) = service(0);
        let user_id = Uuid::new_v4();

        let first = service.spin(user_id, today(), Utc::now()).await.unwrap();
        assert!(first.spun);
        assert!(!first.can_spin);
        assert_eq!(first.reward.as_ref().map(|r| r.code.as_str()), Some("coins_10"));

        let second = service.spin(user_id, today(), Utc::now()).await.unwrap();
        assert!(!second.spun);
        assert!(!second.can_spin);
        assert!(second.reward.is_none());

        assert_eq!(store.list_rewards(user_id).await.unwrap().len(), 1);

        let tomorrow = today() + Duration::days(1);
        assert!(service.spin_status(user_id, tomorrow).await.unwrap().can_spin);
    }

    #[tokio::test]
    async fn test_claim_rules() {
        let (service, _) = service(0);
        let owner = Uuid::new_v4();
        let reward = service
            .spin(owner, today(), Utc::now())
            .await
            .unwrap()
            .reward
            .unwrap();

        let stranger = service.claim(Uuid::new_v4(), reward.id, Utc::now()).await;
        assert!(matches!(stranger, Err(TrackerError::Forbidden(_))));

        let claimed = service.claim(owner, reward.id, Utc::now()).await.unwrap();
        assert_eq!(claimed.coins, 10);
        assert!(claimed.reward.claimed_at.is_some());

        let again = service.claim(owner, reward.id, Utc::now()).await;
        assert!(matches!(again, Err(TrackerError::Validation(_))));

        let missing = service.claim(owner, Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(missing, Err(TrackerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_week_of_check_ins_awards_badge_once() {
        let (service, store) = service(0);
        let user_id = Uuid::new_v4();
        let start = today();

        let mut last = None;
        for offset in 0..7 {
            last = Some(
                service
                    .log_activity(user_id, start + Duration::days(offset), Utc::now())
                    .await
                    .unwrap(),
            );
        }
        let seventh = last.unwrap();
        assert_eq!(seventh.current_streak, 7);
        assert_eq!(seventh.new_badges, vec!["streak_7".to_string()]);
        assert_eq!(seventh.coins_awarded, DAILY_CHECK_IN_COINS + 50);

        let repeat = service
            .log_activity(user_id, start + Duration::days(6), Utc::now())
            .await
            .unwrap();
        assert!(repeat.already_logged_today);
        assert_eq!(repeat.coins_awarded, 0);

        let progress = store.load_progress(user_id).await.unwrap().unwrap();
        assert_eq!(progress.coins, 7 * DAILY_CHECK_IN_COINS + 50);
        // 85 coins + one badge = 135
        assert_eq!(progress.level, 2);
        assert_eq!(progress.title, "Budget Apprentice");
    }

    #[tokio::test]
    async fn test_gap_resets_streak() {
        let (service, _) = service(0);
        let user_id = Uuid::new_v4();

        service.log_activity(user_id, today(), Utc::now()).await.unwrap();
        service
            .log_activity(user_id, today() + Duration::days(1), Utc::now())
            .await
            .unwrap();
        let after_gap = service
            .log_activity(user_id, today() + Duration::days(5), Utc::now())
            .await
            .unwrap();

        assert_eq!(after_gap.current_streak, 1);
        assert_eq!(after_gap.longest_streak, 2);
    }

    #[tokio::test]
    async fn test_streak_freeze_prize_bridges_a_missed_day() {
        let (service, store) = service(88);
        let user_id = Uuid::new_v4();

        let reward = service.spin(user_id, today(), Utc::now()).await.unwrap().reward.unwrap();
        assert_eq!(reward.code, spin::STREAK_FREEZE_PRIZE);
        let claimed = service.claim(user_id, reward.id, Utc::now()).await.unwrap();
        assert_eq!(claimed.streak_freezes, 1);
        assert_eq!(claimed.coins, 0);

        service.log_activity(user_id, today(), Utc::now()).await.unwrap();
        service
            .log_activity(user_id, today() + Duration::days(1), Utc::now())
            .await
            .unwrap();
        let bridged = service
            .log_activity(user_id, today() + Duration::days(3), Utc::now())
            .await
            .unwrap();
        assert!(bridged.freeze_used);
        assert_eq!(bridged.current_streak, 3);

        let progress = store.load_progress(user_id).await.unwrap().unwrap();
        assert_eq!(progress.streak_freezes, 0);

        // no freeze left for the next gap
        let reset = service
            .log_activity(user_id, today() + Duration::days(5), Utc::now())
            .await
            .unwrap();
        assert!(!reset.freeze_used);
        assert_eq!(reset.current_streak, 1);
    }

    #[tokio::test]
    async fn test_same_day_check_ins_pay_once() {
        let (service, store) = service(0);
        let user_id = Uuid::new_v4();

        let (a, b) = tokio::join!(
            service.log_activity(user_id, today(), Utc::now()),
            service.log_activity(user_id, today(), Utc::now()),
        );
        let paid = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|c| !c.already_logged_today)
            .count();
        assert_eq!(paid, 1);

        // a write computed from a stale read is refused
        let stale = CheckInWrite {
            user_id,
            seen: None,
            today: today(),
            current: 1,
            longest: 1,
            freezes_used: 0,
            coins: DAILY_CHECK_IN_COINS,
        };
        assert!(!store.record_check_in(&stale).await.unwrap());

        let progress = store.load_progress(user_id).await.unwrap().unwrap();
        assert_eq!(progress.coins, DAILY_CHECK_IN_COINS);
        assert_eq!(progress.current_streak, 1);
    }
}
