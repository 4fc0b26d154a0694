//! Financial context builder
//!
//! Summarizes a user's last 30 days of transactions for prompts. The context
//! is always recomputed from the same user's rows and is never stored on its
//! own, only as a snapshot inside conversation metadata.

use crate::models::{Transaction, TransactionType};
use crate::store::{LedgerStore, UNCATEGORIZED};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const CONTEXT_WINDOW_DAYS: i64 = 30;
pub const TOP_CATEGORY_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpend {
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialContext {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_balance: Decimal,
    pub top_expense_categories: Vec<CategorySpend>,
    pub transaction_count: usize,
}

impl FinancialContext {
    /// Aggregate transactions given oldest first. Category ties keep the
    /// order in which the category was first seen.
    pub fn from_transactions(transactions: &[Transaction], category_names: &HashMap<Uuid, String>) -> Self {
        let mut total_income = Decimal::ZERO;
        let mut total_expenses = Decimal::ZERO;
        let mut spend: Vec<CategorySpend> = Vec::new();
        let mut slots: HashMap<Option<Uuid>, usize> = HashMap::new();

        for tx in transactions {
            match tx.kind {
                TransactionType::Income => total_income += tx.amount,
                TransactionType::Expense => {
                    total_expenses += tx.amount;

                    let slot = *slots.entry(tx.category_id).or_insert_with(|| {
                        let name = tx
                            .category_id
                            .and_then(|id| category_names.get(&id).cloned())
                            .unwrap_or_else(|| UNCATEGORIZED.to_string());
                        spend.push(CategorySpend {
                            name,
                            amount: Decimal::ZERO,
                        });
                        spend.len() - 1
                    });
                    spend[slot].amount += tx.amount;
                }
            }
        }

        // stable: equal amounts keep first-seen order
        spend.sort_by(|a, b| b.amount.cmp(&a.amount));
        spend.truncate(TOP_CATEGORY_LIMIT);

        Self {
            total_income,
            total_expenses,
            net_balance: total_income - total_expenses,
            top_expense_categories: spend,
            transaction_count: transactions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_count == 0
    }

    /// Plain-text block embedded in prompts
    pub fn prompt_section(&self) -> String {
        if self.is_empty() {
            return "The user has not recorded any transactions in the last 30 days.".to_string();
        }

        let mut out = format!(
            "User's finances over the last {} days:\n- Total income: {}\n- Total expenses: {}\n- Net balance: {}\n- Transactions recorded: {}\n",
            CONTEXT_WINDOW_DAYS,
            self.total_income.round_dp(2),
            self.total_expenses.round_dp(2),
            self.net_balance.round_dp(2),
            self.transaction_count
        );

        if !self.top_expense_categories.is_empty() {
            out.push_str("- Top expense categories:\n");
            for category in &self.top_expense_categories {
                out.push_str(&format!("  - {}: {}\n", category.name, category.amount.round_dp(2)));
            }
        }

        out
    }
}

/// Build the 30-day context for one user
pub async fn build_context<S: LedgerStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<FinancialContext> {
    let since = now - Duration::days(CONTEXT_WINDOW_DAYS);
    let transactions = store.transactions_created_since(user_id, since).await?;
    if transactions.is_empty() {
        return Ok(FinancialContext::default());
    }

    let category_names: HashMap<Uuid, String> = store
        .all_categories(user_id)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    Ok(FinancialContext::from_transactions(&transactions, &category_names))
}
