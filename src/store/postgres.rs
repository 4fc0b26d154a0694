//! Postgres-backed store
//!
//! Schema is created idempotently on connect.

use super::{
    BalanceChange, CategoryTotal, CheckInWrite, ContentStore, ConversationStore,
    GamificationStore, LedgerStore, MonthTotal, UserStore, UNCATEGORIZED,
};
use crate::error::TrackerError;
use crate::models::{
    shifted_balance, Account, Badge, Budget, Category, Conversation, DailySpin, Goal, Media, Page, Post, Reward,
    Role, Session, Transaction, User, UserProgress,
};
use crate::pagination::{
    AccountFilter, BudgetFilter, CategoryFilter, ContentFilter, GoalFilter, PageRequest,
    Paginated, SortField, TransactionFilter,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder, Row};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id UUID PRIMARY KEY,
      name TEXT NOT NULL,
      email TEXT NOT NULL UNIQUE,
      password_hash TEXT NOT NULL,
      role TEXT NOT NULL DEFAULT 'user',
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
      token_hash TEXT PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      name TEXT NOT NULL,
      kind TEXT NOT NULL,
      balance NUMERIC(14, 2) NOT NULL DEFAULT 0,
      currency TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      name TEXT NOT NULL,
      kind TEXT NOT NULL,
      color TEXT,
      icon TEXT,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      account_id UUID REFERENCES accounts(id) ON DELETE SET NULL,
      category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
      kind TEXT NOT NULL,
      amount NUMERIC(14, 2) NOT NULL,
      description TEXT NOT NULL,
      occurred_on DATE NOT NULL,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_created ON transactions (user_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_occurred ON transactions (user_id, occurred_on)",
    r#"
    CREATE TABLE IF NOT EXISTS budgets (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
      name TEXT NOT NULL,
      amount NUMERIC(14, 2) NOT NULL,
      period TEXT NOT NULL,
      start_date DATE NOT NULL,
      end_date DATE,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS goals (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      name TEXT NOT NULL,
      target_amount NUMERIC(14, 2) NOT NULL,
      current_amount NUMERIC(14, 2) NOT NULL DEFAULT 0,
      deadline DATE,
      status TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      question TEXT NOT NULL,
      answer TEXT NOT NULL,
      kind TEXT NOT NULL,
      metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
      created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_user_time ON conversations (user_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS user_progress (
      user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
      current_streak INTEGER NOT NULL DEFAULT 0,
      longest_streak INTEGER NOT NULL DEFAULT 0,
      last_logged_on DATE,
      coins BIGINT NOT NULL DEFAULT 0,
      streak_freezes INTEGER NOT NULL DEFAULT 0,
      level INTEGER NOT NULL DEFAULT 1,
      title TEXT NOT NULL DEFAULT 'Newbie Saver',
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "ALTER TABLE user_progress ADD COLUMN IF NOT EXISTS streak_freezes INTEGER NOT NULL DEFAULT 0",
    r#"
    CREATE TABLE IF NOT EXISTS badges (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      code TEXT NOT NULL,
      awarded_at TIMESTAMPTZ NOT NULL,
      UNIQUE (user_id, code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS daily_spins (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      spun_on DATE NOT NULL,
      created_at TIMESTAMPTZ NOT NULL,
      UNIQUE (user_id, spun_on)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rewards (
      id UUID PRIMARY KEY,
      user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
      spin_id UUID REFERENCES daily_spins(id) ON DELETE SET NULL,
      code TEXT NOT NULL,
      label TEXT NOT NULL,
      coins BIGINT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL,
      claimed_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pages (
      id UUID PRIMARY KEY,
      author_id UUID NOT NULL REFERENCES users(id),
      slug TEXT NOT NULL UNIQUE,
      title TEXT NOT NULL,
      body TEXT NOT NULL,
      status TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
      id UUID PRIMARY KEY,
      author_id UUID NOT NULL REFERENCES users(id),
      slug TEXT NOT NULL UNIQUE,
      title TEXT NOT NULL,
      excerpt TEXT,
      body TEXT NOT NULL,
      status TEXT NOT NULL,
      published_at TIMESTAMPTZ,
      created_at TIMESTAMPTZ NOT NULL,
      updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS media (
      id UUID PRIMARY KEY,
      uploader_id UUID NOT NULL REFERENCES users(id),
      filename TEXT NOT NULL,
      url TEXT NOT NULL,
      mime_type TEXT NOT NULL,
      size_bytes BIGINT NOT NULL,
      alt_text TEXT,
      created_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Postgres store backed by a connection pool
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and make sure every table exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| TrackerError::DatabaseError(format!("Failed to connect: {}", e)))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Postgres store ready");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    TrackerError::DatabaseError(format!("Failed to initialize schema: {}", e))
                })?;
        }
        Ok(())
    }

    async fn fetch_page<T>(
        &self,
        mut query: QueryBuilder<'static, Postgres>,
        mut count: QueryBuilder<'static, Postgres>,
        page: PageRequest,
        map: fn(&PgRow) -> Result<T>,
    ) -> Result<Paginated<T>> {
        query.push(" LIMIT ").push_bind(page.limit());
        query.push(" OFFSET ").push_bind(page.offset());

        let rows = query.build().fetch_all(&self.pool).await?;
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let data = rows.iter().map(map).collect::<Result<Vec<T>>>()?;
        Ok(Paginated::new(data, page, total.max(0) as u64))
    }

    async fn delete_by_id(&self, table: &'static str, id: Uuid) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ensure_progress_row(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("INSERT INTO user_progress (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

//
// ================= Row mapping =================
//

fn parse_text<T: FromStr>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|_| TrackerError::DatabaseError(format!("Invalid {} value: {}", column, raw)))
}

fn unsigned(row: &PgRow, column: &str) -> Result<u32> {
    let value: i32 = row.try_get(column)?;
    Ok(value.max(0) as u32)
}

/// Unique violations surface as field validation errors
fn unique_as_invalid(e: sqlx::Error, field: &str) -> TrackerError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            TrackerError::invalid(field, format!("The {} has already been taken.", field))
        }
        _ => e.into(),
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: parse_text(row, "role")?,
        created_at: row.try_get("created_at")?,
    })
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        kind: parse_text(row, "kind")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn category_from_row(row: &PgRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        kind: parse_text(row, "kind")?,
        color: row.try_get("color")?,
        icon: row.try_get("icon")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        account_id: row.try_get("account_id")?,
        category_id: row.try_get("category_id")?,
        kind: parse_text(row, "kind")?,
        amount: row.try_get("amount")?,
        description: row.try_get("description")?,
        occurred_on: row.try_get("occurred_on")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn budget_from_row(row: &PgRow) -> Result<Budget> {
    Ok(Budget {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        amount: row.try_get("amount")?,
        period: parse_text(row, "period")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn goal_from_row(row: &PgRow) -> Result<Goal> {
    Ok(Goal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        target_amount: row.try_get("target_amount")?,
        current_amount: row.try_get("current_amount")?,
        deadline: row.try_get("deadline")?,
        status: parse_text(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn conversation_from_row(row: &PgRow) -> Result<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        kind: parse_text(row, "kind")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

fn progress_from_row(row: &PgRow) -> Result<UserProgress> {
    Ok(UserProgress {
        user_id: row.try_get("user_id")?,
        current_streak: unsigned(row, "current_streak")?,
        longest_streak: unsigned(row, "longest_streak")?,
        last_logged_on: row.try_get("last_logged_on")?,
        coins: row.try_get("coins")?,
        streak_freezes: unsigned(row, "streak_freezes")?,
        level: unsigned(row, "level")?,
        title: row.try_get("title")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn badge_from_row(row: &PgRow) -> Result<Badge> {
    Ok(Badge {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        code: row.try_get("code")?,
        awarded_at: row.try_get("awarded_at")?,
    })
}

fn spin_from_row(row: &PgRow) -> Result<DailySpin> {
    Ok(DailySpin {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        spun_on: row.try_get("spun_on")?,
        created_at: row.try_get("created_at")?,
    })
}

fn reward_from_row(row: &PgRow) -> Result<Reward> {
    Ok(Reward {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        spin_id: row.try_get("spin_id")?,
        code: row.try_get("code")?,
        label: row.try_get("label")?,
        coins: row.try_get("coins")?,
        created_at: row.try_get("created_at")?,
        claimed_at: row.try_get("claimed_at")?,
    })
}

fn page_from_row(row: &PgRow) -> Result<Page> {
    Ok(Page {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        status: parse_text(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn post_from_row(row: &PgRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        excerpt: row.try_get("excerpt")?,
        body: row.try_get("body")?,
        status: parse_text(row, "status")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn media_from_row(row: &PgRow) -> Result<Media> {
    Ok(Media {
        id: row.try_get("id")?,
        uploader_id: row.try_get("uploader_id")?,
        filename: row.try_get("filename")?,
        url: row.try_get("url")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        alt_text: row.try_get("alt_text")?,
        created_at: row.try_get("created_at")?,
    })
}

//
// ================= List query builders =================
//

/// SELECT and COUNT builders sharing one WHERE clause
fn scoped(table: &str, user_column: &str, user_id: Option<Uuid>) -> (QueryBuilder<'static, Postgres>, QueryBuilder<'static, Postgres>) {
    let mut select = QueryBuilder::new(format!("SELECT * FROM {} WHERE TRUE", table));
    let mut count = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", table));
    if let Some(user_id) = user_id {
        for qb in [&mut select, &mut count] {
            qb.push(format!(" AND {} = ", user_column)).push_bind(user_id);
        }
    }
    (select, count)
}

fn push_order<S: SortField>(
    qb: &mut QueryBuilder<'static, Postgres>,
    sort: S,
    direction: crate::pagination::SortDirection,
) {
    qb.push(format!(
        " ORDER BY {} {} NULLS LAST, created_at DESC, id DESC",
        sort.column(),
        direction.as_sql()
    ));
}

//
// ================= Transaction writes =================
//

async fn upsert_transaction<'e>(db: impl PgExecutor<'e>, tx: &Transaction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions
          (id, user_id, account_id, category_id, kind, amount, description, occurred_on, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
          account_id = EXCLUDED.account_id,
          category_id = EXCLUDED.category_id,
          kind = EXCLUDED.kind,
          amount = EXCLUDED.amount,
          description = EXCLUDED.description,
          occurred_on = EXCLUDED.occurred_on,
          updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.account_id)
    .bind(tx.category_id)
    .bind(tx.kind.as_str())
    .bind(tx.amount)
    .bind(&tx.description)
    .bind(tx.occurred_on)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Locks accounts in id order and applies each change, failing before the
/// caller commits when a balance would leave the money range
async fn apply_balances(db: &mut PgConnection, changes: &[BalanceChange], skip_missing: bool) -> Result<()> {
    let mut ordered = changes.to_vec();
    ordered.sort_by_key(|c| c.account_id);

    for change in ordered {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(change.account_id)
                .fetch_optional(&mut *db)
                .await?;
        let Some(balance) = balance else {
            if skip_missing {
                continue;
            }
            return Err(TrackerError::invalid("account_id", "The selected account_id is invalid."));
        };

        sqlx::query("UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1")
            .bind(change.account_id)
            .bind(shifted_balance(balance, change.delta)?)
            .execute(&mut *db)
            .await?;
    }
    Ok(())
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_invalid(e, "email"))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self, page: PageRequest) -> Result<Paginated<User>> {
        let (mut select, count) = scoped("users", "id", None);
        select.push(" ORDER BY created_at ASC");
        self.fetch_page(select, count, page, user_from_row).await
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        let row = sqlx::query("UPDATE users SET role = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_for_session(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT u.* FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, name, kind, balance, currency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
              name = EXCLUDED.name,
              kind = EXCLUDED.kind,
              balance = EXCLUDED.balance,
              currency = EXCLUDED.currency,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.name)
        .bind(account.kind.as_str())
        .bind(account.balance)
        .bind(&account.currency)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn delete_account(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("accounts", id).await
    }

    async fn list_accounts(&self, user_id: Uuid, filter: &AccountFilter) -> Result<Paginated<Account>> {
        let (mut select, mut count) = scoped("accounts", "user_id", Some(user_id));
        for qb in [&mut select, &mut count] {
            if let Some(kind) = filter.fields.kind {
                qb.push(" AND kind = ").push_bind(kind.as_str());
            }
            if let Some(search) = &filter.search {
                qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, account_from_row).await
    }

    async fn save_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, user_id, name, kind, color, icon, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
              name = EXCLUDED.name,
              kind = EXCLUDED.kind,
              color = EXCLUDED.color,
              icon = EXCLUDED.icon,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(category.id)
        .bind(category.user_id)
        .bind(&category.name)
        .bind(category.kind.as_str())
        .bind(&category.color)
        .bind(&category.icon)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("categories", id).await
    }

    async fn list_categories(&self, user_id: Uuid, filter: &CategoryFilter) -> Result<Paginated<Category>> {
        let (mut select, mut count) = scoped("categories", "user_id", Some(user_id));
        for qb in [&mut select, &mut count] {
            if let Some(kind) = filter.fields.kind {
                qb.push(" AND kind = ").push_bind(kind.as_str());
            }
            if let Some(search) = &filter.search {
                qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, category_from_row).await
    }

    async fn all_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories WHERE user_id = $1 ORDER BY created_at ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(category_from_row).collect()
    }

    async fn save_transaction(&self, tx: &Transaction) -> Result<()> {
        upsert_transaction(&self.pool, tx).await
    }

    async fn record_transaction(&self, tx: &Transaction, changes: &[BalanceChange]) -> Result<()> {
        let mut db = self.pool.begin().await?;
        apply_balances(&mut db, changes, false).await?;
        upsert_transaction(&mut *db, tx).await?;
        db.commit().await?;
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn remove_transaction(&self, id: Uuid, changes: &[BalanceChange]) -> Result<bool> {
        let mut db = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *db)
            .await?;
        if deleted.rows_affected() == 0 {
            db.rollback().await?;
            return Ok(false);
        }
        apply_balances(&mut db, changes, true).await?;
        db.commit().await?;
        Ok(true)
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Paginated<Transaction>> {
        let f = &filter.fields;
        let (mut select, mut count) = scoped("transactions", "user_id", Some(user_id));
        for qb in [&mut select, &mut count] {
            if let Some(kind) = f.kind {
                qb.push(" AND kind = ").push_bind(kind.as_str());
            }
            if let Some(category_id) = f.category_id {
                qb.push(" AND category_id = ").push_bind(category_id);
            }
            if let Some(account_id) = f.account_id {
                qb.push(" AND account_id = ").push_bind(account_id);
            }
            if let Some(from) = f.from {
                qb.push(" AND occurred_on >= ").push_bind(from);
            }
            if let Some(to) = f.to {
                qb.push(" AND occurred_on <= ").push_bind(to);
            }
            if let Some(search) = &filter.search {
                qb.push(" AND description ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, transaction_from_row).await
    }

    async fn transactions_created_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE user_id = $1 AND created_at >= $2 ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn save_budget(&self, budget: &Budget) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO budgets
              (id, user_id, category_id, name, amount, period, start_date, end_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
              category_id = EXCLUDED.category_id,
              name = EXCLUDED.name,
              amount = EXCLUDED.amount,
              period = EXCLUDED.period,
              start_date = EXCLUDED.start_date,
              end_date = EXCLUDED.end_date,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(budget.id)
        .bind(budget.user_id)
        .bind(budget.category_id)
        .bind(&budget.name)
        .bind(budget.amount)
        .bind(budget.period.as_str())
        .bind(budget.start_date)
        .bind(budget.end_date)
        .bind(budget.created_at)
        .bind(budget.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_budget(&self, id: Uuid) -> Result<Option<Budget>> {
        let row = sqlx::query("SELECT * FROM budgets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(budget_from_row).transpose()
    }

    async fn delete_budget(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("budgets", id).await
    }

    async fn list_budgets(&self, user_id: Uuid, filter: &BudgetFilter) -> Result<Paginated<Budget>> {
        let (mut select, mut count) = scoped("budgets", "user_id", Some(user_id));
        for qb in [&mut select, &mut count] {
            if let Some(period) = filter.fields.period {
                qb.push(" AND period = ").push_bind(period.as_str());
            }
            if let Some(search) = &filter.search {
                qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, budget_from_row).await
    }

    async fn save_goal(&self, goal: &Goal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO goals
              (id, user_id, name, target_amount, current_amount, deadline, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
              name = EXCLUDED.name,
              target_amount = EXCLUDED.target_amount,
              current_amount = EXCLUDED.current_amount,
              deadline = EXCLUDED.deadline,
              status = EXCLUDED.status,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(goal.id)
        .bind(goal.user_id)
        .bind(&goal.name)
        .bind(goal.target_amount)
        .bind(goal.current_amount)
        .bind(goal.deadline)
        .bind(goal.status.as_str())
        .bind(goal.created_at)
        .bind(goal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_goal(&self, id: Uuid) -> Result<Option<Goal>> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(goal_from_row).transpose()
    }

    async fn delete_goal(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("goals", id).await
    }

    async fn list_goals(&self, user_id: Uuid, filter: &GoalFilter) -> Result<Paginated<Goal>> {
        let (mut select, mut count) = scoped("goals", "user_id", Some(user_id));
        for qb in [&mut select, &mut count] {
            if let Some(status) = filter.fields.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(search) = &filter.search {
                qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, goal_from_row).await
    }

    async fn sum_expenses(
        &self,
        user_id: Uuid,
        category_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Decimal> {
        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount) FROM transactions
            WHERE user_id = $1 AND kind = 'expense'
              AND occurred_on BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR category_id = $4)
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.unwrap_or_default())
    }

    async fn totals_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(Decimal, Decimal)> {
        let row = sqlx::query(
            r#"
            SELECT
              COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0) AS income,
              COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) AS expenses
            FROM transactions
            WHERE user_id = $1 AND occurred_on BETWEEN $2 AND $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("income")?, row.try_get("expenses")?))
    }

    async fn expenses_by_category(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT t.category_id, c.name, SUM(t.amount) AS total
            FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.user_id = $1 AND t.kind = 'expense'
              AND t.occurred_on BETWEEN $2 AND $3
            GROUP BY t.category_id, c.name
            ORDER BY total DESC, c.name ASC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let name: Option<String> = row.try_get("name")?;
                Ok(CategoryTotal {
                    category_id: row.try_get("category_id")?,
                    name: name.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                    total: row.try_get("total")?,
                })
            })
            .collect()
    }

    async fn monthly_totals(&self, user_id: Uuid, year: i32) -> Result<Vec<MonthTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT
              EXTRACT(MONTH FROM occurred_on)::int AS month,
              COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0) AS income,
              COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) AS expenses
            FROM transactions
            WHERE user_id = $1 AND EXTRACT(YEAR FROM occurred_on)::int = $2
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(user_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MonthTotal {
                    month: unsigned(row, "month")?,
                    income: row.try_get("income")?,
                    expenses: row.try_get("expenses")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ConversationStore for PostgresStore {
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, question, answer, kind, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.user_id)
        .bind(&conversation.question)
        .bind(&conversation.answer)
        .bind(conversation.kind.as_str())
        .bind(&conversation.metadata)
        .bind(conversation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_conversations(&self, user_id: Uuid, limit: u32) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(conversation_from_row).collect()
    }

    async fn answers_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<String>> {
        let answers = sqlx::query_scalar(
            "SELECT answer FROM conversations WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }
}

#[async_trait]
impl GamificationStore for PostgresStore {
    async fn load_progress(&self, user_id: Uuid) -> Result<Option<UserProgress>> {
        let row = sqlx::query("SELECT * FROM user_progress WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(progress_from_row).transpose()
    }

    async fn record_check_in(&self, write: &CheckInWrite) -> Result<bool> {
        self.ensure_progress_row(write.user_id).await?;
        let result = sqlx::query(
            r#"
            UPDATE user_progress SET
              current_streak = $3,
              longest_streak = $4,
              last_logged_on = $5,
              streak_freezes = streak_freezes - $6,
              coins = coins + $7,
              updated_at = NOW()
            WHERE user_id = $1
              AND last_logged_on IS NOT DISTINCT FROM $2
              AND streak_freezes >= $6
            "#,
        )
        .bind(write.user_id)
        .bind(write.seen)
        .bind(write.current as i32)
        .bind(write.longest as i32)
        .bind(write.today)
        .bind(write.freezes_used as i32)
        .bind(write.coins)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_coins(&self, user_id: Uuid, delta: i64) -> Result<()> {
        self.ensure_progress_row(user_id).await?;
        sqlx::query("UPDATE user_progress SET coins = coins + $2, updated_at = NOW() WHERE user_id = $1")
            .bind(user_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_level(&self, user_id: Uuid, level: u32, title: &str) -> Result<()> {
        self.ensure_progress_row(user_id).await?;
        sqlx::query("UPDATE user_progress SET level = $2, title = $3 WHERE user_id = $1")
            .bind(user_id)
            .bind(level as i32)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn award_badge(&self, badge: &Badge) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO badges (id, user_id, code, awarded_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, code) DO NOTHING
            "#,
        )
        .bind(badge.id)
        .bind(badge.user_id)
        .bind(&badge.code)
        .bind(badge.awarded_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_badges(&self, user_id: Uuid) -> Result<Vec<Badge>> {
        let rows = sqlx::query("SELECT * FROM badges WHERE user_id = $1 ORDER BY awarded_at ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(badge_from_row).collect()
    }

    async fn spin_on(&self, user_id: Uuid, day: NaiveDate) -> Result<Option<DailySpin>> {
        let row = sqlx::query("SELECT * FROM daily_spins WHERE user_id = $1 AND spun_on = $2")
            .bind(user_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(spin_from_row).transpose()
    }

    async fn record_spin(&self, spin: &DailySpin, reward: &Reward) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO daily_spins (id, user_id, spun_on, created_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, spun_on) DO NOTHING
            "#,
        )
        .bind(spin.id)
        .bind(spin.user_id)
        .bind(spin.spun_on)
        .bind(spin.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO rewards (id, user_id, spin_id, code, label, coins, created_at, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reward.id)
        .bind(reward.user_id)
        .bind(reward.spin_id)
        .bind(&reward.code)
        .bind(&reward.label)
        .bind(reward.coins)
        .bind(reward.created_at)
        .bind(reward.claimed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_reward(&self, id: Uuid) -> Result<Option<Reward>> {
        let row = sqlx::query("SELECT * FROM rewards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(reward_from_row).transpose()
    }

    async fn list_rewards(&self, user_id: Uuid) -> Result<Vec<Reward>> {
        let rows = sqlx::query("SELECT * FROM rewards WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(reward_from_row).collect()
    }

    async fn claim_reward(&self, id: Uuid, at: DateTime<Utc>, freezes: u32) -> Result<Option<Reward>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE rewards SET claimed_at = $2 WHERE id = $1 AND claimed_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let reward = reward_from_row(&row)?;

        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, coins, streak_freezes, updated_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
              coins = user_progress.coins + EXCLUDED.coins,
              streak_freezes = user_progress.streak_freezes + EXCLUDED.streak_freezes,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(reward.user_id)
        .bind(reward.coins)
        .bind(freezes as i32)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(reward))
    }
}

#[async_trait]
impl ContentStore for PostgresStore {
    async fn save_page(&self, page: &Page) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (id, author_id, slug, title, body, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
              slug = EXCLUDED.slug,
              title = EXCLUDED.title,
              body = EXCLUDED.body,
              status = EXCLUDED.status,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(page.id)
        .bind(page.author_id)
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.body)
        .bind(page.status.as_str())
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_invalid(e, "slug"))?;
        Ok(())
    }

    async fn get_page(&self, id: Uuid) -> Result<Option<Page>> {
        let row = sqlx::query("SELECT * FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(page_from_row).transpose()
    }

    async fn delete_page(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("pages", id).await
    }

    async fn list_pages(&self, filter: &ContentFilter) -> Result<Paginated<Page>> {
        let (mut select, mut count) = scoped("pages", "author_id", None);
        for qb in [&mut select, &mut count] {
            if let Some(status) = filter.fields.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(search) = &filter.search {
                qb.push(" AND title ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, page_from_row).await
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts
              (id, author_id, slug, title, excerpt, body, status, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
              slug = EXCLUDED.slug,
              title = EXCLUDED.title,
              excerpt = EXCLUDED.excerpt,
              body = EXCLUDED.body,
              status = EXCLUDED.status,
              published_at = EXCLUDED.published_at,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.body)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_as_invalid(e, "slug"))?;
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("posts", id).await
    }

    async fn list_posts(&self, filter: &ContentFilter) -> Result<Paginated<Post>> {
        let (mut select, mut count) = scoped("posts", "author_id", None);
        for qb in [&mut select, &mut count] {
            if let Some(status) = filter.fields.status {
                qb.push(" AND status = ").push_bind(status.as_str());
            }
            if let Some(search) = &filter.search {
                qb.push(" AND title ILIKE ").push_bind(like_pattern(search));
            }
        }
        push_order(&mut select, filter.sort, filter.direction);
        self.fetch_page(select, count, filter.page, post_from_row).await
    }

    async fn insert_media(&self, media: &Media) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media (id, uploader_id, filename, url, mime_type, size_bytes, alt_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(media.id)
        .bind(media.uploader_id)
        .bind(&media.filename)
        .bind(&media.url)
        .bind(&media.mime_type)
        .bind(media.size_bytes)
        .bind(&media.alt_text)
        .bind(media.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_media(&self, id: Uuid) -> Result<Option<Media>> {
        let row = sqlx::query("SELECT * FROM media WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(media_from_row).transpose()
    }

    async fn delete_media(&self, id: Uuid) -> Result<bool> {
        self.delete_by_id("media", id).await
    }

    async fn list_media(&self, page: PageRequest) -> Result<Paginated<Media>> {
        let (mut select, count) = scoped("media", "uploader_id", None);
        select.push(" ORDER BY created_at DESC");
        self.fetch_page(select, count, page, media_from_row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{GoalSort, SortDirection, TransactionSort};

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_like_pattern_leaves_plain_text() {
        assert_eq!(like_pattern("coffee"), "%coffee%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_push_order_uses_whitelisted_column_with_stable_ties() {
        let (mut select, _) = scoped("transactions", "user_id", Some(Uuid::nil()));
        push_order(&mut select, TransactionSort::Amount, SortDirection::Asc);
        assert!(select
            .sql()
            .ends_with(" ORDER BY amount ASC NULLS LAST, created_at DESC, id DESC"));

        let (mut select, _) = scoped("goals", "user_id", None);
        push_order(&mut select, GoalSort::default(), SortDirection::default());
        assert_eq!(
            select.sql(),
            "SELECT * FROM goals WHERE TRUE ORDER BY deadline DESC NULLS LAST, created_at DESC, id DESC"
        );
    }

    #[test]
    fn test_scoped_builders_share_filter() {
        let (select, count) = scoped("transactions", "user_id", Some(Uuid::nil()));
        assert!(select.sql().starts_with("SELECT * FROM transactions WHERE TRUE AND user_id = $1"));
        assert!(count.sql().starts_with("SELECT COUNT(*) FROM transactions WHERE TRUE AND user_id = $1"));
    }
}
