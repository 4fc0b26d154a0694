//! Postgres store checks; run with `DATABASE_URL` set and `--ignored`

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use takatrack::models::{
    max_money, Account, AccountKind, Badge, Category, DailySpin, Reward, Role, Transaction,
    TransactionType, User,
};
use takatrack::pagination::{PageRequest, TransactionFilter};
use takatrack::store::{
    BalanceChange, CheckInWrite, GamificationStore, LedgerStore, PostgresStore, UserStore,
};
use takatrack::TrackerError;
use uuid::Uuid;

async fn store() -> Option<PostgresStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(PostgresStore::connect(&url).await.expect("connect to DATABASE_URL"))
}

async fn user(store: &PostgresStore) -> Uuid {
    let id = Uuid::new_v4();
    store
        .insert_user(&User {
            id,
            name: "Test User".to_string(),
            email: format!("{}@takatrack.test", id),
            password_hash: "hash".to_string(),
            role: Role::User,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    id
}

fn spin_with_reward(user_id: Uuid, code: &str, coins: i64) -> (DailySpin, Reward) {
    let now = Utc::now();
    let spin = DailySpin {
        id: Uuid::new_v4(),
        user_id,
        spun_on: now.date_naive(),
        created_at: now,
    };
    let reward = Reward {
        id: Uuid::new_v4(),
        user_id,
        spin_id: Some(spin.id),
        code: code.to_string(),
        label: code.to_string(),
        coins,
        created_at: now,
        claimed_at: None,
    };
    (spin, reward)
}

fn transaction(user_id: Uuid, account_id: Option<Uuid>, amount: i64) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: Uuid::new_v4(),
        user_id,
        account_id,
        category_id: None,
        kind: TransactionType::Income,
        amount: Decimal::from(amount),
        description: format!("income {}", amount),
        occurred_on: now.date_naive(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn second_spin_on_a_day_is_not_recorded() {
    let Some(store) = store().await else { return };
    let user_id = user(&store).await;

    let (spin, reward) = spin_with_reward(user_id, "coins_10", 10);
    assert!(store.record_spin(&spin, &reward).await.unwrap());

    let (again, other) = spin_with_reward(user_id, "coins_50", 50);
    assert!(!store.record_spin(&again, &other).await.unwrap());

    let rewards = store.list_rewards(user_id).await.unwrap();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].id, reward.id);
    assert!(store.spin_on(user_id, spin.spun_on).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn rewards_are_claimed_once() {
    let Some(store) = store().await else { return };
    let user_id = user(&store).await;

    let (spin, reward) = spin_with_reward(user_id, "streak_freeze", 0);
    store.record_spin(&spin, &reward).await.unwrap();

    let claimed = store.claim_reward(reward.id, Utc::now(), 1).await.unwrap();
    assert!(claimed.and_then(|r| r.claimed_at).is_some());
    assert!(store.claim_reward(reward.id, Utc::now(), 1).await.unwrap().is_none());

    let progress = store.load_progress(user_id).await.unwrap().unwrap();
    assert_eq!(progress.streak_freezes, 1);
    assert_eq!(progress.coins, 0);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn badges_are_awarded_once() {
    let Some(store) = store().await else { return };
    let user_id = user(&store).await;

    let badge = |code: &str| Badge {
        id: Uuid::new_v4(),
        user_id,
        code: code.to_string(),
        awarded_at: Utc::now(),
    };
    assert!(store.award_badge(&badge("streak_7")).await.unwrap());
    assert!(!store.award_badge(&badge("streak_7")).await.unwrap());
    assert!(store.award_badge(&badge("lucky")).await.unwrap());
    assert_eq!(store.list_badges(user_id).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn check_in_is_applied_for_one_reader_only() {
    let Some(store) = store().await else { return };
    let user_id = user(&store).await;
    let today = Utc::now().date_naive();

    let write = CheckInWrite {
        user_id,
        seen: None,
        today,
        current: 1,
        longest: 1,
        freezes_used: 0,
        coins: 5,
    };
    assert!(store.record_check_in(&write).await.unwrap());
    assert!(!store.record_check_in(&write).await.unwrap());

    let tomorrow = CheckInWrite {
        seen: Some(today),
        today: today + Duration::days(1),
        current: 2,
        longest: 2,
        ..write
    };
    assert!(store.record_check_in(&tomorrow).await.unwrap());

    let progress = store.load_progress(user_id).await.unwrap().unwrap();
    assert_eq!(progress.coins, 10);
    assert_eq!(progress.current_streak, 2);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn transaction_and_balance_commit_together() {
    let Some(store) = store().await else { return };
    let user_id = user(&store).await;
    let now = Utc::now();

    let account = Account {
        id: Uuid::new_v4(),
        user_id,
        name: "Vault".to_string(),
        kind: AccountKind::Bank,
        balance: max_money() - Decimal::ONE,
        currency: "USD".to_string(),
        created_at: now,
        updated_at: now,
    };
    store.save_account(&account).await.unwrap();

    let tx = transaction(user_id, Some(account.id), 5);
    let change = BalanceChange { account_id: account.id, delta: Decimal::from(5) };
    let err = store.record_transaction(&tx, &[change]).await;
    assert!(matches!(err, Err(TrackerError::Validation(_))));
    assert!(store.get_transaction(tx.id).await.unwrap().is_none());

    let refund = BalanceChange { account_id: account.id, delta: -Decimal::from(5) };
    store.record_transaction(&tx, &[refund]).await.unwrap();
    let balance = store.get_account(account.id).await.unwrap().unwrap().balance;
    assert_eq!(balance, account.balance - Decimal::from(5));

    let undo = BalanceChange { account_id: account.id, delta: Decimal::from(5) };
    assert!(store.remove_transaction(tx.id, &[undo]).await.unwrap());
    assert!(!store.remove_transaction(tx.id, &[undo]).await.unwrap());
    let balance = store.get_account(account.id).await.unwrap().unwrap().balance;
    assert_eq!(balance, account.balance);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn transaction_pages_and_category_detach() {
    let Some(store) = store().await else { return };
    let user_id = user(&store).await;
    let now = Utc::now();

    let category = Category {
        id: Uuid::new_v4(),
        user_id,
        name: "Salary".to_string(),
        kind: TransactionType::Income,
        color: None,
        icon: None,
        created_at: now,
        updated_at: now,
    };
    store.save_category(&category).await.unwrap();

    for amount in 1..=5 {
        let mut tx = transaction(user_id, None, amount);
        tx.category_id = Some(category.id);
        store.save_transaction(&tx).await.unwrap();
    }

    let filter = TransactionFilter {
        page: PageRequest { page: 3, per_page: 2 },
        ..Default::default()
    };
    let page = store.list_transactions(user_id, &filter).await.unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.meta.total, 5);
    assert_eq!(page.meta.last_page, 3);

    assert!(store.delete_category(category.id).await.unwrap());
    let all = store
        .transactions_created_since(user_id, now - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|t| t.category_id.is_none()));
}
