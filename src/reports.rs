//! Period summaries and monthly breakdowns

use crate::error::TrackerError;
use crate::store::Store;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdown {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub total: Decimal,
    /// Share of total expenses, 0-100
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
    pub savings_rate: Decimal,
    pub categories: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthBucket {
    pub month: u32,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub months: Vec<MonthBucket>,
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part / whole * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

pub struct ReportService {
    store: Arc<dyn Store>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Defaults to month-to-date
    pub async fn summary(&self, user_id: Uuid, query: SummaryQuery, today: NaiveDate) -> Result<Summary> {
        let from = query.from.unwrap_or_else(|| today.with_day(1).unwrap_or(today));
        let to = query.to.unwrap_or(today);
        if from > to {
            return Err(TrackerError::invalid("from", "The from date must be before or equal to the to date."));
        }

        let (income, expenses) = self.store.totals_between(user_id, from, to).await?;
        let categories = self
            .store
            .expenses_by_category(user_id, from, to)
            .await?
            .into_iter()
            .map(|c| CategoryBreakdown {
                percentage: percent_of(c.total, expenses),
                category_id: c.category_id,
                name: c.name,
                total: c.total,
            })
            .collect();

        let net = income - expenses;
        Ok(Summary {
            from,
            to,
            income,
            expenses,
            net,
            savings_rate: percent_of(net, income),
            categories,
        })
    }

    /// Always twelve buckets; months without activity are zero
    pub async fn monthly(&self, user_id: Uuid, query: MonthlyQuery, today: NaiveDate) -> Result<MonthlyReport> {
        let year = query.year.unwrap_or_else(|| today.year());
        if !(1970..=9999).contains(&year) {
            return Err(TrackerError::invalid("year", "The year is out of range."));
        }

        let totals = self.store.monthly_totals(user_id, year).await?;
        let months = (1..=12)
            .map(|month| {
                let (income, expenses) = totals
                    .iter()
                    .find(|t| t.month == month)
                    .map(|t| (t.income, t.expenses))
                    .unwrap_or_default();
                MonthBucket {
                    month,
                    income,
                    expenses,
                    net: income - expenses,
                }
            })
            .collect();

        Ok(MonthlyReport { year, months })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Transaction, TransactionType};
    use crate::store::{InMemoryStore, LedgerStore, UNCATEGORIZED};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn record(store: &InMemoryStore, user_id: Uuid, kind: TransactionType, amount: i64, on: NaiveDate) {
        let now = Utc::now();
        store
            .save_transaction(&Transaction {
                id: Uuid::new_v4(),
                user_id,
                account_id: None,
                category_id: None,
                kind,
                amount: Decimal::from(amount),
                description: "entry".to_string(),
                occurred_on: on,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_summary_totals_and_rate() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        record(&store, user_id, TransactionType::Income, 4000, date(2024, 4, 2)).await;
        record(&store, user_id, TransactionType::Expense, 1000, date(2024, 4, 10)).await;
        record(&store, user_id, TransactionType::Expense, 999, date(2024, 3, 31)).await;

        let service = ReportService::new(store);
        let summary = service
            .summary(user_id, SummaryQuery::default(), date(2024, 4, 20))
            .await
            .unwrap();

        assert_eq!(summary.from, date(2024, 4, 1));
        assert_eq!(summary.income, Decimal::from(4000));
        assert_eq!(summary.expenses, Decimal::from(1000));
        assert_eq!(summary.savings_rate, Decimal::from(75));
        assert_eq!(summary.categories.len(), 1);
        assert_eq!(summary.categories[0].name, UNCATEGORIZED);
        assert_eq!(summary.categories[0].percentage, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_zero_income_and_bad_range() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        record(&store, user_id, TransactionType::Expense, 50, date(2024, 4, 2)).await;

        let service = ReportService::new(store);
        let summary = service
            .summary(user_id, SummaryQuery::default(), date(2024, 4, 20))
            .await
            .unwrap();
        assert_eq!(summary.savings_rate, Decimal::ZERO);

        let reversed = SummaryQuery {
            from: Some(date(2024, 5, 1)),
            to: Some(date(2024, 4, 1)),
        };
        assert!(matches!(
            service.summary(user_id, reversed, date(2024, 4, 20)).await,
            Err(TrackerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_monthly_has_twelve_buckets() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        record(&store, user_id, TransactionType::Income, 300, date(2024, 2, 3)).await;
        record(&store, user_id, TransactionType::Expense, 100, date(2024, 2, 9)).await;
        record(&store, user_id, TransactionType::Expense, 70, date(2023, 2, 9)).await;

        let report = ReportService::new(store)
            .monthly(user_id, MonthlyQuery { year: Some(2024) }, date(2024, 6, 1))
            .await
            .unwrap();

        assert_eq!(report.months.len(), 12);
        assert_eq!(report.months[1].net, Decimal::from(200));
        assert_eq!(report.months[0].income, Decimal::ZERO);
    }
}
