//! In-memory store for development and tests

use super::{
    BalanceChange, CategoryTotal, CheckInWrite, ContentStore, ConversationStore,
    GamificationStore, LedgerStore, MonthTotal, UserStore, UNCATEGORIZED,
};
use crate::error::TrackerError;
use crate::models::{
    shifted_balance, Account, Badge, Budget, Category, Conversation, DailySpin, Goal, Media, Page,
    Post, Reward, Role, Session, Transaction, TransactionType, User, UserProgress,
};
use crate::pagination::{
    AccountFilter, AccountSort, BudgetFilter, BudgetSort, CategoryFilter, CategorySort,
    ContentFilter, ContentSort, GoalFilter, GoalSort, PageRequest, Paginated, SortDirection,
    TransactionFilter, TransactionSort,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    accounts: HashMap<Uuid, Account>,
    categories: HashMap<Uuid, Category>,
    transactions: HashMap<Uuid, Transaction>,
    budgets: HashMap<Uuid, Budget>,
    goals: HashMap<Uuid, Goal>,
    conversations: Vec<Conversation>,
    progress: HashMap<Uuid, UserProgress>,
    badges: Vec<Badge>,
    spins: Vec<DailySpin>,
    rewards: HashMap<Uuid, Reward>,
    pages: HashMap<Uuid, Page>,
    posts: HashMap<Uuid, Post>,
    media: HashMap<Uuid, Media>,
}

/// In-memory store; one lock over all tables keeps multi-row writes atomic
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_page<T>(
    mut items: Vec<T>,
    direction: SortDirection,
    page: PageRequest,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Paginated<T> {
    items.sort_by(|a, b| direction.apply(cmp(a, b)));
    Paginated::from_sorted(items, page)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Checks every change first, then applies them all
fn apply_balances(tables: &mut Tables, changes: &[BalanceChange], skip_missing: bool) -> Result<()> {
    let mut next = Vec::with_capacity(changes.len());
    for change in changes {
        match tables.accounts.get(&change.account_id) {
            Some(account) => next.push((change.account_id, shifted_balance(account.balance, change.delta)?)),
            None if skip_missing => {}
            None => return Err(TrackerError::invalid("account_id", "The selected account_id is invalid.")),
        }
    }

    let now = Utc::now();
    for (id, balance) in next {
        if let Some(account) = tables.accounts.get_mut(&id) {
            account.balance = balance;
            account.updated_at = now;
        }
    }
    Ok(())
}

fn progress_entry(tables: &mut Tables, user_id: Uuid) -> &mut UserProgress {
    tables
        .progress
        .entry(user_id)
        .or_insert_with(|| UserProgress::new(user_id))
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        let email = user.email.to_lowercase();
        if tables.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(TrackerError::invalid("email", "The email has already been taken."));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn list_users(&self, page: PageRequest) -> Result<Paginated<User>> {
        let users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        Ok(sorted_page(users, SortDirection::Asc, page, |a, b| {
            a.created_at.cmp(&b.created_at)
        }))
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn user_for_session(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(token_hash)
            .filter(|s| s.expires_at > now)
            .and_then(|s| tables.users.get(&s.user_id))
            .cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn save_account(&self, account: &Account) -> Result<()> {
        self.tables
            .write()
            .await
            .accounts
            .insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.accounts.remove(&id).is_some();
        if removed {
            for tx in tables.transactions.values_mut() {
                if tx.account_id == Some(id) {
                    tx.account_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn list_accounts(&self, user_id: Uuid, filter: &AccountFilter) -> Result<Paginated<Account>> {
        let tables = self.tables.read().await;
        let items: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .filter(|a| filter.fields.kind.map_or(true, |k| a.kind == k))
            .filter(|a| filter.search.as_deref().map_or(true, |s| contains_ci(&a.name, s)))
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| match filter.sort {
            AccountSort::Name => cmp_text(&a.name, &b.name),
            AccountSort::Balance => a.balance.cmp(&b.balance),
            AccountSort::CreatedAt => a.created_at.cmp(&b.created_at),
        }))
    }

    async fn save_category(&self, category: &Category) -> Result<()> {
        self.tables
            .write()
            .await
            .categories
            .insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.categories.remove(&id).is_some();
        if removed {
            for tx in tables.transactions.values_mut() {
                if tx.category_id == Some(id) {
                    tx.category_id = None;
                }
            }
            tables.budgets.retain(|_, b| b.category_id != id);
        }
        Ok(removed)
    }

    async fn list_categories(&self, user_id: Uuid, filter: &CategoryFilter) -> Result<Paginated<Category>> {
        let tables = self.tables.read().await;
        let items: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.user_id == user_id)
            .filter(|c| filter.fields.kind.map_or(true, |k| c.kind == k))
            .filter(|c| filter.search.as_deref().map_or(true, |s| contains_ci(&c.name, s)))
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| match filter.sort {
            CategorySort::Name => cmp_text(&a.name, &b.name),
            CategorySort::CreatedAt => a.created_at.cmp(&b.created_at),
        }))
    }

    async fn all_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn save_transaction(&self, tx: &Transaction) -> Result<()> {
        self.tables
            .write()
            .await
            .transactions
            .insert(tx.id, tx.clone());
        Ok(())
    }

    async fn record_transaction(&self, tx: &Transaction, changes: &[BalanceChange]) -> Result<()> {
        let mut tables = self.tables.write().await;
        apply_balances(&mut tables, changes, false)?;
        tables.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn remove_transaction(&self, id: Uuid, changes: &[BalanceChange]) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.transactions.contains_key(&id) {
            return Ok(false);
        }
        apply_balances(&mut tables, changes, true)?;
        tables.transactions.remove(&id);
        Ok(true)
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Paginated<Transaction>> {
        let tables = self.tables.read().await;
        let f = &filter.fields;
        let items: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| f.kind.map_or(true, |k| t.kind == k))
            .filter(|t| f.category_id.map_or(true, |c| t.category_id == Some(c)))
            .filter(|t| f.account_id.map_or(true, |a| t.account_id == Some(a)))
            .filter(|t| f.from.map_or(true, |d| t.occurred_on >= d))
            .filter(|t| f.to.map_or(true, |d| t.occurred_on <= d))
            .filter(|t| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |s| contains_ci(&t.description, s))
            })
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| {
            let primary = match filter.sort {
                TransactionSort::OccurredOn => a.occurred_on.cmp(&b.occurred_on),
                TransactionSort::Amount => a.amount.cmp(&b.amount),
                TransactionSort::CreatedAt => a.created_at.cmp(&b.created_at),
                TransactionSort::Description => cmp_text(&a.description, &b.description),
            };
            primary.then_with(|| a.created_at.cmp(&b.created_at))
        }))
    }

    async fn transactions_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.user_id == user_id && t.created_at >= since)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn save_budget(&self, budget: &Budget) -> Result<()> {
        self.tables
            .write()
            .await
            .budgets
            .insert(budget.id, budget.clone());
        Ok(())
    }

    async fn get_budget(&self, id: Uuid) -> Result<Option<Budget>> {
        Ok(self.tables.read().await.budgets.get(&id).cloned())
    }

    async fn delete_budget(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.budgets.remove(&id).is_some())
    }

    async fn list_budgets(&self, user_id: Uuid, filter: &BudgetFilter) -> Result<Paginated<Budget>> {
        let tables = self.tables.read().await;
        let items: Vec<Budget> = tables
            .budgets
            .values()
            .filter(|b| b.user_id == user_id)
            .filter(|b| filter.fields.period.map_or(true, |p| b.period == p))
            .filter(|b| filter.search.as_deref().map_or(true, |s| contains_ci(&b.name, s)))
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| match filter.sort {
            BudgetSort::StartDate => a.start_date.cmp(&b.start_date),
            BudgetSort::Amount => a.amount.cmp(&b.amount),
            BudgetSort::Name => cmp_text(&a.name, &b.name),
        }))
    }

    async fn save_goal(&self, goal: &Goal) -> Result<()> {
        self.tables.write().await.goals.insert(goal.id, goal.clone());
        Ok(())
    }

    async fn get_goal(&self, id: Uuid) -> Result<Option<Goal>> {
        Ok(self.tables.read().await.goals.get(&id).cloned())
    }

    async fn delete_goal(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.goals.remove(&id).is_some())
    }

    async fn list_goals(&self, user_id: Uuid, filter: &GoalFilter) -> Result<Paginated<Goal>> {
        let tables = self.tables.read().await;
        let items: Vec<Goal> = tables
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .filter(|g| filter.fields.status.map_or(true, |s| g.status == s))
            .filter(|g| filter.search.as_deref().map_or(true, |s| contains_ci(&g.name, s)))
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| match filter.sort {
            GoalSort::Deadline => a.deadline.cmp(&b.deadline),
            GoalSort::TargetAmount => a.target_amount.cmp(&b.target_amount),
            GoalSort::Name => cmp_text(&a.name, &b.name),
            GoalSort::CreatedAt => a.created_at.cmp(&b.created_at),
        }))
    }

    async fn sum_expenses(
        &self,
        user_id: Uuid,
        category_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .filter(|t| t.user_id == user_id && t.kind == TransactionType::Expense)
            .filter(|t| t.occurred_on >= from && t.occurred_on <= to)
            .filter(|t| category_id.map_or(true, |c| t.category_id == Some(c)))
            .map(|t| t.amount)
            .sum())
    }

    async fn totals_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(Decimal, Decimal)> {
        let tables = self.tables.read().await;
        let mut income = Decimal::ZERO;
        let mut expenses = Decimal::ZERO;
        for t in tables.transactions.values().filter(|t| {
            t.user_id == user_id && t.occurred_on >= from && t.occurred_on <= to
        }) {
            match t.kind {
                TransactionType::Income => income += t.amount,
                TransactionType::Expense => expenses += t.amount,
            }
        }
        Ok((income, expenses))
    }

    async fn expenses_by_category(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>> {
        let tables = self.tables.read().await;
        let mut totals: HashMap<Option<Uuid>, Decimal> = HashMap::new();
        for t in tables.transactions.values().filter(|t| {
            t.user_id == user_id
                && t.kind == TransactionType::Expense
                && t.occurred_on >= from
                && t.occurred_on <= to
        }) {
            *totals.entry(t.category_id).or_default() += t.amount;
        }

        let mut rows: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(category_id, total)| CategoryTotal {
                category_id,
                name: category_id
                    .and_then(|id| tables.categories.get(&id))
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                total,
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn monthly_totals(&self, user_id: Uuid, year: i32) -> Result<Vec<MonthTotal>> {
        let tables = self.tables.read().await;
        let mut months: BTreeMap<u32, (Decimal, Decimal)> = BTreeMap::new();
        for t in tables
            .transactions
            .values()
            .filter(|t| t.user_id == user_id && t.occurred_on.year() == year)
        {
            let entry = months.entry(t.occurred_on.month()).or_default();
            match t.kind {
                TransactionType::Income => entry.0 += t.amount,
                TransactionType::Expense => entry.1 += t.amount,
            }
        }
        Ok(months
            .into_iter()
            .map(|(month, (income, expenses))| MonthTotal {
                month,
                income,
                expenses,
            })
            .collect())
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.tables
            .write()
            .await
            .conversations
            .push(conversation.clone());
        Ok(())
    }

    async fn recent_conversations(&self, user_id: Uuid, limit: u32) -> Result<Vec<Conversation>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Conversation> = tables
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn answers_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id && c.created_at >= since)
            .map(|c| c.answer.clone())
            .collect())
    }
}

#[async_trait]
impl GamificationStore for InMemoryStore {
    async fn load_progress(&self, user_id: Uuid) -> Result<Option<UserProgress>> {
        Ok(self.tables.read().await.progress.get(&user_id).cloned())
    }

    async fn record_check_in(&self, write: &CheckInWrite) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let progress = progress_entry(&mut tables, write.user_id);
        if progress.last_logged_on != write.seen || progress.streak_freezes < write.freezes_used {
            return Ok(false);
        }
        progress.current_streak = write.current;
        progress.longest_streak = write.longest;
        progress.last_logged_on = Some(write.today);
        progress.streak_freezes -= write.freezes_used;
        progress.coins += write.coins;
        progress.updated_at = Utc::now();
        Ok(true)
    }

    async fn add_coins(&self, user_id: Uuid, delta: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let progress = progress_entry(&mut tables, user_id);
        progress.coins += delta;
        progress.updated_at = Utc::now();
        Ok(())
    }

    async fn save_level(&self, user_id: Uuid, level: u32, title: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let progress = progress_entry(&mut tables, user_id);
        progress.level = level;
        progress.title = title.to_string();
        Ok(())
    }

    async fn award_badge(&self, badge: &Badge) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let held = tables
            .badges
            .iter()
            .any(|b| b.user_id == badge.user_id && b.code == badge.code);
        if held {
            return Ok(false);
        }
        tables.badges.push(badge.clone());
        Ok(true)
    }

    async fn list_badges(&self, user_id: Uuid) -> Result<Vec<Badge>> {
        let tables = self.tables.read().await;
        Ok(tables
            .badges
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn spin_on(&self, user_id: Uuid, day: NaiveDate) -> Result<Option<DailySpin>> {
        let tables = self.tables.read().await;
        Ok(tables
            .spins
            .iter()
            .find(|s| s.user_id == user_id && s.spun_on == day)
            .cloned())
    }

    async fn record_spin(&self, spin: &DailySpin, reward: &Reward) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let already = tables
            .spins
            .iter()
            .any(|s| s.user_id == spin.user_id && s.spun_on == spin.spun_on);
        if already {
            return Ok(false);
        }
        tables.spins.push(spin.clone());
        tables.rewards.insert(reward.id, reward.clone());
        Ok(true)
    }

    async fn get_reward(&self, id: Uuid) -> Result<Option<Reward>> {
        Ok(self.tables.read().await.rewards.get(&id).cloned())
    }

    async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<Reward>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Reward> = tables
            .rewards
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn claim_reward(&self, id: Uuid, at: DateTime<Utc>, freezes: u32) -> Result<Option<Reward>> {
        let mut tables = self.tables.write().await;
        let claimed = match tables.rewards.get_mut(&id) {
            Some(reward) if reward.claimed_at.is_none() => {
                reward.claimed_at = Some(at);
                reward.clone()
            }
            Some(_) => return Ok(None),
            None => return Err(TrackerError::not_found("Reward")),
        };
        let progress = progress_entry(&mut tables, claimed.user_id);
        progress.coins += claimed.coins;
        progress.streak_freezes += freezes;
        progress.updated_at = at;
        Ok(Some(claimed))
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn save_page(&self, page: &Page) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .pages
            .values()
            .any(|p| p.slug == page.slug && p.id != page.id)
        {
            return Err(TrackerError::invalid("slug", "The slug has already been taken."));
        }
        tables.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn get_page(&self, id: Uuid) -> Result<Option<Page>> {
        Ok(self.tables.read().await.pages.get(&id).cloned())
    }

    async fn delete_page(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.pages.remove(&id).is_some())
    }

    async fn list_pages(&self, filter: &ContentFilter) -> Result<Paginated<Page>> {
        let tables = self.tables.read().await;
        let items: Vec<Page> = tables
            .pages
            .values()
            .filter(|p| filter.fields.status.map_or(true, |s| p.status == s))
            .filter(|p| filter.search.as_deref().map_or(true, |s| contains_ci(&p.title, s)))
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| match filter.sort {
            ContentSort::CreatedAt => a.created_at.cmp(&b.created_at),
            ContentSort::Title => cmp_text(&a.title, &b.title),
            ContentSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }))
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .posts
            .values()
            .any(|p| p.slug == post.slug && p.id != post.id)
        {
            return Err(TrackerError::invalid("slug", "The slug has already been taken."));
        }
        tables.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }

    async fn list_posts(&self, filter: &ContentFilter) -> Result<Paginated<Post>> {
        let tables = self.tables.read().await;
        let items: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| filter.fields.status.map_or(true, |s| p.status == s))
            .filter(|p| filter.search.as_deref().map_or(true, |s| contains_ci(&p.title, s)))
            .cloned()
            .collect();

        Ok(sorted_page(items, filter.direction, filter.page, |a, b| match filter.sort {
            ContentSort::CreatedAt => a.created_at.cmp(&b.created_at),
            ContentSort::Title => cmp_text(&a.title, &b.title),
            ContentSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }))
    }

    async fn insert_media(&self, media: &Media) -> Result<()> {
        self.tables.write().await.media.insert(media.id, media.clone());
        Ok(())
    }

    async fn get_media(&self, id: Uuid) -> Result<Option<Media>> {
        Ok(self.tables.read().await.media.get(&id).cloned())
    }

    async fn delete_media(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.media.remove(&id).is_some())
    }

    async fn list_media(&self, page: PageRequest) -> Result<Paginated<Media>> {
        let items: Vec<Media> = self.tables.read().await.media.values().cloned().collect();
        Ok(sorted_page(items, SortDirection::Desc, page, |a, b| {
            a.created_at.cmp(&b.created_at)
        }))
    }
}
