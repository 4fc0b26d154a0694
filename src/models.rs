//! Core data models for TakaTrack

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Text-backed enum with stable database/wire names
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

//
// ================= Enums =================
//

text_enum!(Role {
    User => "user",
    Admin => "admin",
    SuperAdmin => "super_admin",
});

text_enum!(TransactionType {
    Income => "income",
    Expense => "expense",
});

text_enum!(AccountKind {
    Cash => "cash",
    Bank => "bank",
    CreditCard => "credit_card",
    EWallet => "e_wallet",
    Investment => "investment",
});

text_enum!(BudgetPeriod {
    Weekly => "weekly",
    Monthly => "monthly",
});

text_enum!(GoalStatus {
    Active => "active",
    Completed => "completed",
});

text_enum!(ConversationType {
    Advice => "advice",
    Analysis => "analysis",
});

text_enum!(ContentStatus {
    Draft => "draft",
    Published => "published",
});

//
// ================= Identity =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

//
// ================= Ledger =================
//

/// Largest magnitude a stored money column holds: 999,999,999,999.99
pub fn max_money() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// Balance after applying `delta`, or a 422 when it leaves the money range
pub fn shifted_balance(balance: Decimal, delta: Decimal) -> crate::Result<Decimal> {
    balance
        .checked_add(delta)
        .filter(|b| b.abs() <= max_money())
        .ok_or_else(|| {
            crate::error::TrackerError::invalid(
                "amount",
                "This would take the account balance out of range.",
            )
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub occurred_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetProgress {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percent_used: Decimal,
    pub over_budget: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: Option<NaiveDate>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//
// ================= Advice =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

//
// ================= Gamification =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    pub user_id: Uuid,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_logged_on: Option<NaiveDate>,
    pub coins: i64,
    /// Unused streak freezes won from the daily spin
    pub streak_freezes: u32,
    pub level: u32,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_logged_on: None,
            coins: 0,
            streak_freezes: 0,
            level: 1,
            title: "Newbie Saver".to_string(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySpin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub spun_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub user_id: Uuid,
    pub spin_id: Option<Uuid>,
    pub code: String,
    pub label: String,
    pub coins: i64,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

//
// ================= Content =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub status: ContentStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert_eq!("Super_Admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_transaction_serializes_kind_as_type() {
        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            account_id: None,
            category_id: None,
            kind: TransactionType::Expense,
            amount: Decimal::new(1250, 2),
            description: "Lunch".to_string(),
            occurred_on: now.date_naive(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "expense");
        assert_eq!(json["amount"], 12.5);
    }

    #[test]
    fn test_user_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "secret".to_string(),
            role: Role::User,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_shifted_balance_stays_in_range() {
        let top = max_money();
        assert_eq!(shifted_balance(top - Decimal::ONE, Decimal::ONE).unwrap(), top);
        assert!(matches!(
            shifted_balance(top, Decimal::new(1, 2)),
            Err(crate::error::TrackerError::Validation(_))
        ));
        assert!(shifted_balance(-top, -Decimal::ONE).is_err());
        // would overflow Decimal itself
        assert!(shifted_balance(Decimal::MAX, Decimal::MAX).is_err());
    }
}
