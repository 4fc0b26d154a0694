//! Offset pagination, sorting and list filters shared by every list endpoint

use crate::error::TrackerError;
use crate::models::{AccountKind, BudgetPeriod, ContentStatus, GoalStatus, TransactionType};
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Apply direction to an ascending ordering
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Raw query string accepted by list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<String>,
    pub direction: Option<SortDirection>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub period: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn from_query(query: &ListQuery) -> Result<Self> {
        let page = query.page.unwrap_or(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);

        if page == 0 {
            return Err(TrackerError::invalid("page", "The page must be at least 1."));
        }
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(TrackerError::invalid(
                "per_page",
                format!("The per page must be between 1 and {}.", MAX_PER_PAGE),
            ));
        }

        Ok(Self { page, per_page })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            ((total + request.per_page as u64 - 1) / request.per_page as u64) as u32
        };

        Self {
            data,
            meta: PageMeta {
                page: request.page,
                per_page: request.per_page,
                total,
                last_page,
            },
        }
    }

    /// Slice an already filtered and sorted collection
    pub fn from_sorted(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.per_page as usize)
            .collect();
        Self::new(data, request, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Whitelisted sort column; the string form is the SQL column name
pub trait SortField: Sized + Copy + Default {
    fn parse(raw: &str) -> Option<Self>;
    fn column(&self) -> &'static str;
}

macro_rules! sort_field {
    ($name:ident, default $default:ident, { $($variant:ident => $column:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl SortField for $name {
            fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($column => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn column(&self) -> &'static str {
                match self {
                    $($name::$variant => $column),+
                }
            }
        }
    };
}

sort_field!(TransactionSort, default OccurredOn, {
    OccurredOn => "occurred_on",
    Amount => "amount",
    CreatedAt => "created_at",
    Description => "description",
});

sort_field!(AccountSort, default Name, {
    Name => "name",
    Balance => "balance",
    CreatedAt => "created_at",
});

sort_field!(CategorySort, default Name, {
    Name => "name",
    CreatedAt => "created_at",
});

sort_field!(BudgetSort, default StartDate, {
    StartDate => "start_date",
    Amount => "amount",
    Name => "name",
});

sort_field!(GoalSort, default Deadline, {
    Deadline => "deadline",
    TargetAmount => "target_amount",
    Name => "name",
    CreatedAt => "created_at",
});

sort_field!(ContentSort, default CreatedAt, {
    CreatedAt => "created_at",
    Title => "title",
    UpdatedAt => "updated_at",
});

/// Typed list request for one resource
#[derive(Debug, Clone)]
pub struct ListFilter<S, F> {
    pub page: PageRequest,
    pub sort: S,
    pub direction: SortDirection,
    pub search: Option<String>,
    pub fields: F,
}

impl<S: SortField, F> ListFilter<S, F> {
    pub fn from_query(query: &ListQuery, fields: F) -> Result<Self> {
        let sort = match query.sort.as_deref() {
            None => S::default(),
            Some(raw) => S::parse(raw).ok_or_else(|| {
                TrackerError::invalid("sort", format!("Sorting by '{}' is not supported.", raw))
            })?,
        };

        Ok(Self {
            page: PageRequest::from_query(query)?,
            sort,
            direction: query.direction.unwrap_or_default(),
            search: query
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            fields,
        })
    }
}

impl<S: SortField, F: Default> Default for ListFilter<S, F> {
    fn default() -> Self {
        Self {
            page: PageRequest::default(),
            sort: S::default(),
            direction: SortDirection::default(),
            search: None,
            fields: F::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFields {
    pub kind: Option<TransactionType>,
    pub category_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountFields {
    pub kind: Option<AccountKind>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFields {
    pub kind: Option<TransactionType>,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetFields {
    pub period: Option<BudgetPeriod>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalFields {
    pub status: Option<GoalStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentFields {
    pub status: Option<ContentStatus>,
}

pub type TransactionFilter = ListFilter<TransactionSort, TransactionFields>;
pub type AccountFilter = ListFilter<AccountSort, AccountFields>;
pub type CategoryFilter = ListFilter<CategorySort, CategoryFields>;
pub type BudgetFilter = ListFilter<BudgetSort, BudgetFields>;
pub type GoalFilter = ListFilter<GoalSort, GoalFields>;
pub type ContentFilter = ListFilter<ContentSort, ContentFields>;

/// Parse an optional enum filter, reporting the offending field on failure
pub fn parse_enum<T: std::str::FromStr>(raw: Option<&str>, field: &str) -> Result<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| TrackerError::invalid(field, format!("The selected {} is invalid.", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_bounds() {
        let query = ListQuery {
            per_page: Some(101),
            ..Default::default()
        };
        assert!(PageRequest::from_query(&query).is_err());

        let query = ListQuery {
            page: Some(3),
            per_page: Some(10),
            ..Default::default()
        };
        let req = PageRequest::from_query(&query).unwrap();
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_from_sorted_computes_last_page() {
        let items: Vec<u32> = (1..=31).collect();
        let page = Paginated::from_sorted(items, PageRequest { page: 4, per_page: 10 });
        assert_eq!(page.data, vec![31]);
        assert_eq!(page.meta.total, 31);
        assert_eq!(page.meta.last_page, 4);

        let empty: Paginated<u32> = Paginated::from_sorted(vec![], PageRequest::default());
        assert_eq!(empty.meta.last_page, 1);
    }

    #[test]
    fn test_unknown_sort_column_rejected() {
        let query = ListQuery {
            sort: Some("password_hash".to_string()),
            ..Default::default()
        };
        let filter: Result<TransactionFilter> =
            ListFilter::from_query(&query, TransactionFields::default());
        assert!(matches!(filter, Err(TrackerError::Validation(_))));
    }
}
