//! Persistence layer
//!
//! Every per-user query is scoped by `user_id`. The in-memory backend is used
//! for development and tests; Postgres is selected when `DATABASE_URL` is set.

use crate::models::{
    Account, Badge, Budget, Category, Conversation, DailySpin, Goal, Media, Page, Post, Reward,
    Role, Session, Transaction, User, UserProgress,
};
use crate::pagination::{
    AccountFilter, BudgetFilter, CategoryFilter, ContentFilter, GoalFilter, PageRequest,
    Paginated, TransactionFilter,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Expense total for one category (or uncategorized) in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthTotal {
    pub month: u32,
    pub income: Decimal,
    pub expenses: Decimal,
}

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Signed change to one account's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub account_id: Uuid,
    pub delta: Decimal,
}

/// One day's streak update for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInWrite {
    pub user_id: Uuid,
    /// `last_logged_on` as read before computing the update
    pub seen: Option<NaiveDate>,
    pub today: NaiveDate,
    pub current: u32,
    pub longest: u32,
    pub freezes_used: u32,
    pub coins: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with a validation error when the email is taken
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self, page: PageRequest) -> Result<Paginated<User>>;
    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>>;

    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn user_for_session(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>>;
    async fn delete_session(&self, token_hash: &str) -> Result<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn save_account(&self, account: &Account) -> Result<()>;
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>>;
    async fn delete_account(&self, id: Uuid) -> Result<bool>;
    async fn list_accounts(&self, user_id: Uuid, filter: &AccountFilter) -> Result<Paginated<Account>>;

    async fn save_category(&self, category: &Category) -> Result<()>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>>;
    async fn delete_category(&self, id: Uuid) -> Result<bool>;
    async fn list_categories(&self, user_id: Uuid, filter: &CategoryFilter) -> Result<Paginated<Category>>;
    async fn all_categories(&self, user_id: Uuid) -> Result<Vec<Category>>;

    async fn save_transaction(&self, tx: &Transaction) -> Result<()>;
    /// Saves the row and applies every balance change in one unit. Nothing is
    /// written when an account is gone or a balance would leave the money range.
    async fn record_transaction(&self, tx: &Transaction, changes: &[BalanceChange]) -> Result<()>;
    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>>;
    /// Deletes the row and applies the balance changes in one unit; accounts
    /// deleted in the meantime are skipped
    async fn remove_transaction(&self, id: Uuid, changes: &[BalanceChange]) -> Result<bool>;
    async fn list_transactions(&self, user_id: Uuid, filter: &TransactionFilter) -> Result<Paginated<Transaction>>;
    /// Transactions with `created_at >= since`, oldest first, ties by id
    async fn transactions_created_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Transaction>>;

    async fn save_budget(&self, budget: &Budget) -> Result<()>;
    async fn get_budget(&self, id: Uuid) -> Result<Option<Budget>>;
    async fn delete_budget(&self, id: Uuid) -> Result<bool>;
    async fn list_budgets(&self, user_id: Uuid, filter: &BudgetFilter) -> Result<Paginated<Budget>>;

    async fn save_goal(&self, goal: &Goal) -> Result<()>;
    async fn get_goal(&self, id: Uuid) -> Result<Option<Goal>>;
    async fn delete_goal(&self, id: Uuid) -> Result<bool>;
    async fn list_goals(&self, user_id: Uuid, filter: &GoalFilter) -> Result<Paginated<Goal>>;

    /// Sum of expenses with `occurred_on` in `[from, to]`
    async fn sum_expenses(
        &self,
        user_id: Uuid,
        category_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal>;
    /// (income, expenses) with `occurred_on` in `[from, to]`
    async fn totals_between(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<(Decimal, Decimal)>;
    /// Expense totals per category, largest first
    async fn expenses_by_category(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<CategoryTotal>>;
    /// Only months with activity are returned
    async fn monthly_totals(&self, user_id: Uuid, year: i32) -> Result<Vec<MonthTotal>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()>;
    /// Most recent first
    async fn recent_conversations(&self, user_id: Uuid, limit: u32) -> Result<Vec<Conversation>>;
    async fn answers_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<String>>;
}

#[async_trait]
pub trait GamificationStore: Send + Sync {
    async fn load_progress(&self, user_id: Uuid) -> Result<Option<UserProgress>>;
    /// Applies the write only if `last_logged_on` still equals `write.seen`;
    /// false when another request logged first
    async fn record_check_in(&self, write: &CheckInWrite) -> Result<bool>;
    async fn add_coins(&self, user_id: Uuid, delta: i64) -> Result<()>;
    async fn save_level(&self, user_id: Uuid, level: u32, title: &str) -> Result<()>;

    /// Returns false when the badge was already held
    async fn award_badge(&self, badge: &Badge) -> Result<bool>;
    async fn list_badges(&self, user_id: Uuid) -> Result<Vec<Badge>>;

    async fn spin_on(&self, user_id: Uuid, day: NaiveDate) -> Result<Option<DailySpin>>;
    /// Writes spin and reward together; false (and nothing written) when the
    /// user already spun that day
    async fn record_spin(&self, spin: &DailySpin, reward: &Reward) -> Result<bool>;
    async fn get_reward(&self, id: Uuid) -> Result<Option<Reward>>;
    async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<Reward>>;
    /// Marks the reward claimed and credits its coins and `freezes`; `None`
    /// when it was already claimed
    async fn claim_reward(&self, id: Uuid, at: DateTime<Utc>, freezes: u32) -> Result<Option<Reward>>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fails with a validation error when the slug is taken
    async fn save_page(&self, page: &Page) -> Result<()>;
    async fn get_page(&self, id: Uuid) -> Result<Option<Page>>;
    async fn delete_page(&self, id: Uuid) -> Result<bool>;
    async fn list_pages(&self, filter: &ContentFilter) -> Result<Paginated<Page>>;

    async fn save_post(&self, post: &Post) -> Result<()>;
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>>;
    async fn delete_post(&self, id: Uuid) -> Result<bool>;
    async fn list_posts(&self, filter: &ContentFilter) -> Result<Paginated<Post>>;

    async fn insert_media(&self, media: &Media) -> Result<()>;
    async fn get_media(&self, id: Uuid) -> Result<Option<Media>>;
    async fn delete_media(&self, id: Uuid) -> Result<bool>;
    async fn list_media(&self, page: PageRequest) -> Result<Paginated<Media>>;
}

/// Everything the service persists
pub trait Store: UserStore + LedgerStore + ConversationStore + GamificationStore + ContentStore {}

impl<T> Store for T where T: UserStore + LedgerStore + ConversationStore + GamificationStore + ContentStore {}
