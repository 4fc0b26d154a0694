//! Ledger service: accounts, categories, transactions, budgets and goals
//!
//! Every read and write is scoped to the acting user. Rows owned by someone
//! else answer 403; rows that do not exist answer 404.

use crate::error::{TrackerError, Validator};
use crate::models::{
    max_money, Account, AccountKind, Budget, BudgetPeriod, BudgetProgress, Category, Goal, GoalStatus,
    Transaction, TransactionType,
};
use crate::pagination::{AccountFilter, BudgetFilter, CategoryFilter, GoalFilter, Paginated, TransactionFilter};
use crate::store::{BalanceChange, Store};
use crate::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";
const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 255;

//
// ================= Payloads =================
//

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPayload {
    #[serde(default)]
    pub name: String,
    pub kind: Option<String>,
    pub balance: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPayload {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPayload {
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: String,
    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetPayload {
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    pub amount: Option<Decimal>,
    pub period: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalPayload {
    #[serde(default)]
    pub name: String,
    pub target_amount: Option<Decimal>,
    pub current_amount: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributionPayload {
    pub amount: Option<Decimal>,
}

/// Budget together with its progress in the current period
#[derive(Debug, Clone, Serialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub budget: Budget,
    pub progress: BudgetProgress,
}

//
// ================= Validation helpers =================
//

fn parse_choice<T: FromStr>(v: &mut Validator, raw: Option<&str>, field: &str) -> Option<T> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let parsed = raw.and_then(|r| r.parse::<T>().ok());
    v.check(raw.is_some(), field, &format!("The {} field is required.", field));
    v.check(
        raw.is_none() || parsed.is_some(),
        field,
        &format!("The selected {} is invalid.", field),
    );
    parsed
}

fn check_positive_amount(v: &mut Validator, amount: Option<Decimal>, field: &str) -> Decimal {
    match amount {
        None => {
            v.check(false, field, &format!("The {} field is required.", field));
            Decimal::ZERO
        }
        Some(value) => {
            v.check(value > Decimal::ZERO, field, &format!("The {} must be greater than 0.", field));
            v.check(value <= max_money(), field, &format!("The {} is too large.", field));
            value.round_dp(2)
        }
    }
}

fn check_money_range(v: &mut Validator, amount: Option<Decimal>, field: &str) {
    if let Some(value) = amount {
        v.check(value.abs() <= max_money(), field, &format!("The {} is out of range.", field));
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Signed effect of a transaction on its account
fn balance_effect(kind: TransactionType, amount: Decimal) -> Decimal {
    match kind {
        TransactionType::Income => amount,
        TransactionType::Expense => -amount,
    }
}

/// Net balance changes per account, in account id order
fn net_changes(effects: impl IntoIterator<Item = (Option<Uuid>, Decimal)>) -> Vec<BalanceChange> {
    let mut net: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for (account_id, delta) in effects {
        if let Some(account_id) = account_id {
            *net.entry(account_id).or_default() += delta;
        }
    }
    net.into_iter()
        .filter(|(_, delta)| !delta.is_zero())
        .map(|(account_id, delta)| BalanceChange { account_id, delta })
        .collect()
}

/// Calendar window of the budget period containing `today`, clipped to the
/// budget's own start and end dates
pub fn budget_window(budget: &Budget, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (start, end) = match budget.period {
        BudgetPeriod::Weekly => {
            let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            (start, start + Duration::days(6))
        }
        BudgetPeriod::Monthly => {
            let start = today.with_day(1).unwrap_or(today);
            let next_month = if start.month() == 12 {
                NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
            };
            let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(today);
            (start, end)
        }
    };

    let start = start.max(budget.start_date);
    let end = match budget.end_date {
        Some(end_date) => end.min(end_date),
        None => end,
    };
    (start, end)
}

pub fn budget_progress(amount: Decimal, spent: Decimal, window: (NaiveDate, NaiveDate)) -> BudgetProgress {
    let percent_used = if amount.is_zero() {
        Decimal::ZERO
    } else {
        (spent / amount * Decimal::ONE_HUNDRED).round_dp(2)
    };

    BudgetProgress {
        window_start: window.0,
        window_end: window.1,
        spent,
        remaining: (amount - spent).max(Decimal::ZERO),
        percent_used,
        over_budget: spent > amount,
    }
}

pub struct LedgerService {
    store: Arc<dyn Store>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    //
    // ----- accounts -----
    //

    pub async fn list_accounts(&self, user_id: Uuid, filter: &AccountFilter) -> Result<Paginated<Account>> {
        self.store.list_accounts(user_id, filter).await
    }

    pub async fn get_account(&self, user_id: Uuid, id: Uuid) -> Result<Account> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Account"))?;
        if account.user_id != user_id {
            return Err(TrackerError::not_owner("account"));
        }
        Ok(account)
    }

    fn validate_account(payload: &AccountPayload) -> Result<(AccountKind, String)> {
        let mut v = Validator::new();
        v.require_text(&payload.name, "name", MAX_NAME_LEN);
        let kind = parse_choice::<AccountKind>(&mut v, payload.kind.as_deref(), "kind");
        check_money_range(&mut v, payload.balance, "balance");

        let currency = payload
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        v.check(
            currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()),
            "currency",
            "The currency must be a 3-letter code.",
        );
        v.finish()?;

        Ok((kind.unwrap_or(AccountKind::Cash), currency))
    }

    pub async fn create_account(&self, user_id: Uuid, payload: AccountPayload, now: DateTime<Utc>) -> Result<Account> {
        let (kind, currency) = Self::validate_account(&payload)?;

        let account = Account {
            id: Uuid::new_v4(),
            user_id,
            name: payload.name.trim().to_string(),
            kind,
            balance: payload.balance.unwrap_or_default().round_dp(2),
            currency,
            created_at: now,
            updated_at: now,
        };
        self.store.save_account(&account).await?;
        Ok(account)
    }

    pub async fn update_account(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: AccountPayload,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let mut account = self.get_account(user_id, id).await?;
        let (kind, currency) = Self::validate_account(&payload)?;

        account.name = payload.name.trim().to_string();
        account.kind = kind;
        account.currency = currency;
        if let Some(balance) = payload.balance {
            account.balance = balance.round_dp(2);
        }
        account.updated_at = now;

        self.store.save_account(&account).await?;
        Ok(account)
    }

    pub async fn delete_account(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.get_account(user_id, id).await?;
        self.store.delete_account(id).await?;
        Ok(())
    }

    //
    // ----- categories -----
    //

    pub async fn list_categories(&self, user_id: Uuid, filter: &CategoryFilter) -> Result<Paginated<Category>> {
        self.store.list_categories(user_id, filter).await
    }

    pub async fn get_category(&self, user_id: Uuid, id: Uuid) -> Result<Category> {
        let category = self
            .store
            .get_category(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Category"))?;
        if category.user_id != user_id {
            return Err(TrackerError::not_owner("category"));
        }
        Ok(category)
    }

    fn validate_category(payload: &CategoryPayload) -> Result<TransactionType> {
        let mut v = Validator::new();
        v.require_text(&payload.name, "name", MAX_NAME_LEN);
        let kind = parse_choice::<TransactionType>(&mut v, payload.kind.as_deref(), "type");
        if let Some(color) = payload.color.as_deref() {
            v.check(is_hex_color(color), "color", "The color must be a hex value like #1A2B3C.");
        }
        if let Some(icon) = payload.icon.as_deref() {
            v.check(icon.chars().count() <= 50, "icon", "The icon may not be greater than 50 characters.");
        }
        v.finish()?;
        Ok(kind.unwrap_or(TransactionType::Expense))
    }

    pub async fn create_category(&self, user_id: Uuid, payload: CategoryPayload, now: DateTime<Utc>) -> Result<Category> {
        let kind = Self::validate_category(&payload)?;

        let category = Category {
            id: Uuid::new_v4(),
            user_id,
            name: payload.name.trim().to_string(),
            kind,
            color: payload.color,
            icon: payload.icon,
            created_at: now,
            updated_at: now,
        };
        self.store.save_category(&category).await?;
        Ok(category)
    }

    pub async fn update_category(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: CategoryPayload,
        now: DateTime<Utc>,
    ) -> Result<Category> {
        let mut category = self.get_category(user_id, id).await?;
        let kind = Self::validate_category(&payload)?;

        category.name = payload.name.trim().to_string();
        category.kind = kind;
        category.color = payload.color;
        category.icon = payload.icon;
        category.updated_at = now;

        self.store.save_category(&category).await?;
        Ok(category)
    }

    pub async fn delete_category(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.get_category(user_id, id).await?;
        self.store.delete_category(id).await?;
        Ok(())
    }

    //
    // ----- transactions -----
    //

    pub async fn list_transactions(&self, user_id: Uuid, filter: &TransactionFilter) -> Result<Paginated<Transaction>> {
        self.store.list_transactions(user_id, filter).await
    }

    pub async fn get_transaction(&self, user_id: Uuid, id: Uuid) -> Result<Transaction> {
        let tx = self
            .store
            .get_transaction(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Transaction"))?;
        if tx.user_id != user_id {
            return Err(TrackerError::not_owner("transaction"));
        }
        Ok(tx)
    }

    /// Validates the payload including cross-row references
    async fn validate_transaction(
        &self,
        user_id: Uuid,
        payload: &TransactionPayload,
    ) -> Result<(TransactionType, Decimal)> {
        let mut v = Validator::new();
        let kind = parse_choice::<TransactionType>(&mut v, payload.kind.as_deref(), "type");
        let amount = check_positive_amount(&mut v, payload.amount, "amount");
        v.require_text(&payload.description, "description", MAX_DESCRIPTION_LEN);

        if let Some(account_id) = payload.account_id {
            let owned = self
                .store
                .get_account(account_id)
                .await?
                .map_or(false, |a| a.user_id == user_id);
            v.check(owned, "account_id", "The selected account_id is invalid.");
        }

        if let Some(category_id) = payload.category_id {
            match self.store.get_category(category_id).await? {
                Some(category) if category.user_id == user_id => {
                    if let Some(kind) = kind {
                        v.check(
                            category.kind == kind,
                            "category_id",
                            "The category type must match the transaction type.",
                        );
                    }
                }
                _ => {
                    v.check(false, "category_id", "The selected category_id is invalid.");
                }
            }
        }

        v.finish()?;
        Ok((kind.unwrap_or(TransactionType::Expense), amount))
    }

    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        payload: TransactionPayload,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let (kind, amount) = self.validate_transaction(user_id, &payload).await?;

        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id,
            account_id: payload.account_id,
            category_id: payload.category_id,
            kind,
            amount,
            description: payload.description.trim().to_string(),
            occurred_on: payload.occurred_on.unwrap_or_else(|| now.date_naive()),
            created_at: now,
            updated_at: now,
        };
        let changes = net_changes([(tx.account_id, balance_effect(tx.kind, tx.amount))]);
        self.store.record_transaction(&tx, &changes).await?;

        info!(user_id = %user_id, transaction_id = %tx.id, kind = %tx.kind, "Transaction recorded");
        Ok(tx)
    }

    pub async fn update_transaction(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: TransactionPayload,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let mut tx = self.get_transaction(user_id, id).await?;
        let (kind, amount) = self.validate_transaction(user_id, &payload).await?;
        let reversed = (tx.account_id, -balance_effect(tx.kind, tx.amount));

        tx.account_id = payload.account_id;
        tx.category_id = payload.category_id;
        tx.kind = kind;
        tx.amount = amount;
        tx.description = payload.description.trim().to_string();
        tx.occurred_on = payload.occurred_on.unwrap_or(tx.occurred_on);
        tx.updated_at = now;

        let changes = net_changes([reversed, (tx.account_id, balance_effect(tx.kind, tx.amount))]);
        self.store.record_transaction(&tx, &changes).await?;
        Ok(tx)
    }

    pub async fn delete_transaction(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let tx = self.get_transaction(user_id, id).await?;
        let changes = net_changes([(tx.account_id, -balance_effect(tx.kind, tx.amount))]);
        self.store.remove_transaction(id, &changes).await?;
        Ok(())
    }

    //
    // ----- budgets -----
    //

    pub async fn list_budgets(
        &self,
        user_id: Uuid,
        filter: &BudgetFilter,
        today: NaiveDate,
    ) -> Result<Paginated<BudgetView>> {
        let page = self.store.list_budgets(user_id, filter).await?;

        let mut views = Vec::with_capacity(page.data.len());
        for budget in page.data {
            views.push(self.budget_view(budget, today).await?);
        }
        Ok(Paginated {
            data: views,
            meta: page.meta,
        })
    }

    async fn budget_view(&self, budget: Budget, today: NaiveDate) -> Result<BudgetView> {
        let window = budget_window(&budget, today);
        let spent = if window.0 > window.1 {
            Decimal::ZERO
        } else {
            self.store
                .sum_expenses(budget.user_id, Some(budget.category_id), window.0, window.1)
                .await?
        };
        let progress = budget_progress(budget.amount, spent, window);
        Ok(BudgetView { budget, progress })
    }

    async fn owned_budget(&self, user_id: Uuid, id: Uuid) -> Result<Budget> {
        let budget = self
            .store
            .get_budget(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Budget"))?;
        if budget.user_id != user_id {
            return Err(TrackerError::not_owner("budget"));
        }
        Ok(budget)
    }

    pub async fn get_budget(&self, user_id: Uuid, id: Uuid, today: NaiveDate) -> Result<BudgetView> {
        let budget = self.owned_budget(user_id, id).await?;
        self.budget_view(budget, today).await
    }

    async fn validate_budget(
        &self,
        user_id: Uuid,
        payload: &BudgetPayload,
    ) -> Result<(Uuid, Decimal, BudgetPeriod, NaiveDate)> {
        let mut v = Validator::new();
        v.require_text(&payload.name, "name", MAX_NAME_LEN);
        let amount = check_positive_amount(&mut v, payload.amount, "amount");
        let period = parse_choice::<BudgetPeriod>(&mut v, payload.period.as_deref(), "period");
        v.check(payload.start_date.is_some(), "start_date", "The start date field is required.");
        if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
            v.check(end >= start, "end_date", "The end date must be a date after or equal to start date.");
        }

        match payload.category_id {
            None => {
                v.check(false, "category_id", "The category_id field is required.");
            }
            Some(category_id) => match self.store.get_category(category_id).await? {
                Some(category) if category.user_id == user_id => {
                    v.check(
                        category.kind == TransactionType::Expense,
                        "category_id",
                        "Budgets can only track expense categories.",
                    );
                }
                _ => {
                    v.check(false, "category_id", "The selected category_id is invalid.");
                }
            },
        }

        v.finish()?;

        match (payload.category_id, period, payload.start_date) {
            (Some(category_id), Some(period), Some(start)) => Ok((category_id, amount, period, start)),
            _ => Err(TrackerError::invalid("budget", "The budget payload is incomplete.")),
        }
    }

    pub async fn create_budget(
        &self,
        user_id: Uuid,
        payload: BudgetPayload,
        now: DateTime<Utc>,
    ) -> Result<BudgetView> {
        let (category_id, amount, period, start_date) = self.validate_budget(user_id, &payload).await?;

        let budget = Budget {
            id: Uuid::new_v4(),
            user_id,
            category_id,
            name: payload.name.trim().to_string(),
            amount,
            period,
            start_date,
            end_date: payload.end_date,
            created_at: now,
            updated_at: now,
        };
        self.store.save_budget(&budget).await?;
        self.budget_view(budget, now.date_naive()).await
    }

    pub async fn update_budget(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: BudgetPayload,
        now: DateTime<Utc>,
    ) -> Result<BudgetView> {
        let mut budget = self.owned_budget(user_id, id).await?;
        let (category_id, amount, period, start_date) = self.validate_budget(user_id, &payload).await?;

        budget.category_id = category_id;
        budget.name = payload.name.trim().to_string();
        budget.amount = amount;
        budget.period = period;
        budget.start_date = start_date;
        budget.end_date = payload.end_date;
        budget.updated_at = now;

        self.store.save_budget(&budget).await?;
        self.budget_view(budget, now.date_naive()).await
    }

    pub async fn delete_budget(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.owned_budget(user_id, id).await?;
        self.store.delete_budget(id).await?;
        Ok(())
    }

    //
    // ----- goals -----
    //

    pub async fn list_goals(&self, user_id: Uuid, filter: &GoalFilter) -> Result<Paginated<Goal>> {
        self.store.list_goals(user_id, filter).await
    }

    pub async fn get_goal(&self, user_id: Uuid, id: Uuid) -> Result<Goal> {
        let goal = self
            .store
            .get_goal(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("Goal"))?;
        if goal.user_id != user_id {
            return Err(TrackerError::not_owner("goal"));
        }
        Ok(goal)
    }

    fn validate_goal(payload: &GoalPayload) -> Result<(Decimal, Decimal)> {
        let mut v = Validator::new();
        v.require_text(&payload.name, "name", MAX_NAME_LEN);
        let target = check_positive_amount(&mut v, payload.target_amount, "target_amount");
        let current = payload.current_amount.unwrap_or_default().round_dp(2);
        v.check(
            current >= Decimal::ZERO,
            "current_amount",
            "The current amount must be at least 0.",
        );
        check_money_range(&mut v, payload.current_amount, "current_amount");
        v.finish()?;
        Ok((target, current))
    }

    fn status_for(current: Decimal, target: Decimal) -> GoalStatus {
        if current >= target {
            GoalStatus::Completed
        } else {
            GoalStatus::Active
        }
    }

    pub async fn create_goal(&self, user_id: Uuid, payload: GoalPayload, now: DateTime<Utc>) -> Result<Goal> {
        let (target_amount, current_amount) = Self::validate_goal(&payload)?;

        let goal = Goal {
            id: Uuid::new_v4(),
            user_id,
            name: payload.name.trim().to_string(),
            target_amount,
            current_amount,
            deadline: payload.deadline,
            status: Self::status_for(current_amount, target_amount),
            created_at: now,
            updated_at: now,
        };
        self.store.save_goal(&goal).await?;
        Ok(goal)
    }

    pub async fn update_goal(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: GoalPayload,
        now: DateTime<Utc>,
    ) -> Result<Goal> {
        let mut goal = self.get_goal(user_id, id).await?;
        let (target_amount, current_amount) = Self::validate_goal(&payload)?;

        goal.name = payload.name.trim().to_string();
        goal.target_amount = target_amount;
        if payload.current_amount.is_some() {
            goal.current_amount = current_amount;
        }
        goal.deadline = payload.deadline;
        goal.status = Self::status_for(goal.current_amount, goal.target_amount);
        goal.updated_at = now;

        self.store.save_goal(&goal).await?;
        Ok(goal)
    }

    pub async fn delete_goal(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        self.get_goal(user_id, id).await?;
        self.store.delete_goal(id).await?;
        Ok(())
    }

    /// Add to a goal's saved amount, completing it once the target is met
    pub async fn contribute(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: ContributionPayload,
        now: DateTime<Utc>,
    ) -> Result<Goal> {
        let mut goal = self.get_goal(user_id, id).await?;

        let mut v = Validator::new();
        let amount = check_positive_amount(&mut v, payload.amount, "amount");
        v.check(
            goal.status == GoalStatus::Active,
            "goal",
            "This goal is already completed.",
        );
        v.check(
            goal.current_amount
                .checked_add(amount)
                .map_or(false, |total| total <= max_money()),
            "amount",
            "The amount would take the goal out of range.",
        );
        v.finish()?;

        goal.current_amount += amount;
        goal.status = Self::status_for(goal.current_amount, goal.target_amount);
        goal.updated_at = now;
        self.store.save_goal(&goal).await?;

        if goal.status == GoalStatus::Completed {
            info!(user_id = %user_id, goal_id = %goal.id, "Goal completed");
        }
        Ok(goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn service() -> LedgerService {
        LedgerService::new(Arc::new(InMemoryStore::new()))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn expense_category(service: &LedgerService, user_id: Uuid) -> Category {
        service
            .create_category(
                user_id,
                CategoryPayload {
                    name: "Food".to_string(),
                    kind: Some("expense".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_transaction_validation_collects_fields() {
        let service = service();
        let err = service
            .create_transaction(
                Uuid::new_v4(),
                TransactionPayload {
                    kind: Some("refund".to_string()),
                    amount: Some(Decimal::from(-5)),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap_err();

        match err {
            TrackerError::Validation(errors) => {
                assert!(errors.contains_key("type"));
                assert!(errors.contains_key("amount"));
                assert!(errors.contains_key("description"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transactions_move_account_balance() {
        let service = service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let account = service
            .create_account(
                user_id,
                AccountPayload {
                    name: "Wallet".to_string(),
                    kind: Some("cash".to_string()),
                    balance: Some(Decimal::from(100)),
                    currency: Some("php".to_string()),
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(account.currency, "PHP");

        let tx = service
            .create_transaction(
                user_id,
                TransactionPayload {
                    account_id: Some(account.id),
                    kind: Some("expense".to_string()),
                    amount: Some(Decimal::from(30)),
                    description: "Lunch".to_string(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(service.get_account(user_id, account.id).await.unwrap().balance, Decimal::from(70));

        service
            .update_transaction(
                user_id,
                tx.id,
                TransactionPayload {
                    account_id: Some(account.id),
                    kind: Some("income".to_string()),
                    amount: Some(Decimal::from(50)),
                    description: "Refund".to_string(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(service.get_account(user_id, account.id).await.unwrap().balance, Decimal::from(150));

        service.delete_transaction(user_id, tx.id).await.unwrap();
        assert_eq!(service.get_account(user_id, account.id).await.unwrap().balance, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_foreign_rows_are_forbidden() {
        let service = service();
        let owner = Uuid::new_v4();
        let category = expense_category(&service, owner).await;

        let stranger = Uuid::new_v4();
        assert!(matches!(
            service.get_category(stranger, category.id).await,
            Err(TrackerError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_category(stranger, Uuid::new_v4()).await,
            Err(TrackerError::NotFound(_))
        ));

        let err = service
            .create_transaction(
                stranger,
                TransactionPayload {
                    category_id: Some(category.id),
                    kind: Some("expense".to_string()),
                    amount: Some(Decimal::from(5)),
                    description: "Sneaky".to_string(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(err, Err(TrackerError::Validation(_))));
    }

    #[test]
    fn test_budget_windows() {
        let now = Utc::now();
        let mut budget = Budget {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            name: "Food".to_string(),
            amount: Decimal::from(400),
            period: BudgetPeriod::Monthly,
            start_date: date(2024, 1, 1),
            end_date: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(budget_window(&budget, date(2024, 2, 14)), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(budget_window(&budget, date(2024, 12, 5)), (date(2024, 12, 1), date(2024, 12, 31)));

        budget.period = BudgetPeriod::Weekly;
        // 2024-05-15 is a Wednesday
        assert_eq!(budget_window(&budget, date(2024, 5, 15)), (date(2024, 5, 13), date(2024, 5, 19)));

        budget.start_date = date(2024, 5, 14);
        budget.end_date = Some(date(2024, 5, 17));
        assert_eq!(budget_window(&budget, date(2024, 5, 15)), (date(2024, 5, 14), date(2024, 5, 17)));
    }

    #[test]
    fn test_budget_progress_math() {
        let window = (date(2024, 2, 1), date(2024, 2, 29));
        let progress = budget_progress(Decimal::from(400), Decimal::from(500), window);
        assert!(progress.over_budget);
        assert_eq!(progress.remaining, Decimal::ZERO);
        assert_eq!(progress.percent_used, Decimal::from(125));

        let idle = budget_progress(Decimal::from(400), Decimal::ZERO, window);
        assert!(!idle.over_budget);
        assert_eq!(idle.remaining, Decimal::from(400));
    }

    #[tokio::test]
    async fn test_budget_tracks_category_spending() {
        let service = service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let category = expense_category(&service, user_id).await;

        service
            .create_transaction(
                user_id,
                TransactionPayload {
                    category_id: Some(category.id),
                    kind: Some("expense".to_string()),
                    amount: Some(Decimal::from(120)),
                    description: "Groceries".to_string(),
                    occurred_on: Some(now.date_naive()),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();

        let view = service
            .create_budget(
                user_id,
                BudgetPayload {
                    category_id: Some(category.id),
                    name: "Food".to_string(),
                    amount: Some(Decimal::from(400)),
                    period: Some("monthly".to_string()),
                    start_date: Some(date(2000, 1, 1)),
                    end_date: None,
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(view.progress.spent, Decimal::from(120));
        assert_eq!(view.progress.percent_used, Decimal::from(30));
    }

    #[tokio::test]
    async fn test_contributions_complete_goal() {
        let service = service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let goal = service
            .create_goal(
                user_id,
                GoalPayload {
                    name: "Laptop".to_string(),
                    target_amount: Some(Decimal::from(1000)),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(goal.status, GoalStatus::Active);

        let partial = service
            .contribute(user_id, goal.id, ContributionPayload { amount: Some(Decimal::from(600)) }, now)
            .await
            .unwrap();
        assert_eq!(partial.status, GoalStatus::Active);

        let done = service
            .contribute(user_id, goal.id, ContributionPayload { amount: Some(Decimal::from(400)) }, now)
            .await
            .unwrap();
        assert_eq!(done.status, GoalStatus::Completed);
        assert_eq!(done.current_amount, Decimal::from(1000));

        let closed = service
            .contribute(user_id, goal.id, ContributionPayload { amount: Some(Decimal::from(1)) }, now)
            .await;
        assert!(matches!(closed, Err(TrackerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_balance_out_of_range_is_rejected_without_writing() {
        let service = service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let huge = service
            .create_account(
                user_id,
                AccountPayload {
                    name: "Vault".to_string(),
                    kind: Some("investment".to_string()),
                    balance: Some(Decimal::from_str("79228000000000000000000000000").unwrap()),
                    ..Default::default()
                },
                now,
            )
            .await;
        assert!(matches!(huge, Err(TrackerError::Validation(ref e)) if e.contains_key("balance")));

        let account = service
            .create_account(
                user_id,
                AccountPayload {
                    name: "Vault".to_string(),
                    kind: Some("investment".to_string()),
                    balance: Some(max_money() - Decimal::ONE),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();

        let income = TransactionPayload {
            account_id: Some(account.id),
            kind: Some("income".to_string()),
            amount: Some(Decimal::from(5)),
            description: "Bonus".to_string(),
            ..Default::default()
        };
        let err = service.create_transaction(user_id, income, now).await;
        assert!(matches!(err, Err(TrackerError::Validation(_))));

        let listed = service.list_transactions(user_id, &TransactionFilter::default()).await.unwrap();
        assert_eq!(listed.meta.total, 0);
        assert_eq!(service.get_account(user_id, account.id).await.unwrap().balance, account.balance);
    }

    #[tokio::test]
    async fn test_moving_transaction_between_accounts_nets_balances() {
        let service = service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let mut ids = Vec::new();
        for name in ["Wallet", "Bank"] {
            let account = service
                .create_account(
                    user_id,
                    AccountPayload {
                        name: name.to_string(),
                        kind: Some("bank".to_string()),
                        balance: Some(Decimal::from(100)),
                        ..Default::default()
                    },
                    now,
                )
                .await
                .unwrap();
            ids.push(account.id);
        }

        let payload = |account_id: Uuid| TransactionPayload {
            account_id: Some(account_id),
            kind: Some("expense".to_string()),
            amount: Some(Decimal::from(40)),
            description: "Groceries".to_string(),
            ..Default::default()
        };
        let tx = service.create_transaction(user_id, payload(ids[0]), now).await.unwrap();
        service.update_transaction(user_id, tx.id, payload(ids[1]), now).await.unwrap();

        assert_eq!(service.get_account(user_id, ids[0]).await.unwrap().balance, Decimal::from(100));
        assert_eq!(service.get_account(user_id, ids[1]).await.unwrap().balance, Decimal::from(60));

        // account removed before the transaction
        service.delete_account(user_id, ids[1]).await.unwrap();
        service.delete_transaction(user_id, tx.id).await.unwrap();
        assert!(matches!(
            service.get_transaction(user_id, tx.id).await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_goal_amounts_stay_in_range() {
        let service = service();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let err = service
            .create_goal(
                user_id,
                GoalPayload {
                    name: "Moon".to_string(),
                    target_amount: Some(Decimal::from(10)),
                    current_amount: Some(max_money() + Decimal::ONE),
                    ..Default::default()
                },
                now,
            )
            .await;
        assert!(matches!(err, Err(TrackerError::Validation(ref e)) if e.contains_key("current_amount")));

        let goal = service
            .create_goal(
                user_id,
                GoalPayload {
                    name: "Moon".to_string(),
                    target_amount: Some(max_money()),
                    current_amount: Some(max_money() - Decimal::ONE),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        let over = service
            .contribute(user_id, goal.id, ContributionPayload { amount: Some(Decimal::from(2)) }, now)
            .await;
        assert!(matches!(over, Err(TrackerError::Validation(_))));
    }
}
