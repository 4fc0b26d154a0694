use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use takatrack::{
    advice::AdviceService,
    config::AppConfig,
    llm::ModelGateway,
    models::{Transaction, TransactionType},
    random::ThreadRandom,
    store::{InMemoryStore, LedgerStore},
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_QUESTION: &str = "I earn a steady salary but never seem to have money left at the end of the month. \
How should I plan my budget so I can start saving for a house deposit?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let question = if question.trim().is_empty() {
        DEFAULT_QUESTION.to_string()
    } else {
        question
    };

    let config = AppConfig::from_env()?;
    let store = Arc::new(InMemoryStore::new());
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    // Sample month: salary plus a few regular expenses
    let sample = [
        (TransactionType::Income, 3500, "Monthly salary"),
        (TransactionType::Expense, 1200, "Rent"),
        (TransactionType::Expense, 450, "Groceries"),
        (TransactionType::Expense, 350, "Car payment"),
    ];
    for (kind, amount, description) in sample {
        store
            .save_transaction(&Transaction {
                id: Uuid::new_v4(),
                user_id,
                account_id: None,
                category_id: None,
                kind,
                amount: Decimal::from(amount),
                description: description.to_string(),
                occurred_on: now.date_naive(),
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    let gateway = Arc::new(ModelGateway::from_config(&config.llm)?);
    let service = AdviceService::new(store, gateway, Arc::new(ThreadRandom));

    info!(user_id = %user_id, question = %question, "Asking for advice");
    let response = service.ask(user_id, &question, now).await;

    println!("\n=== ADVICE ===");
    println!("{}", response.answer);
    println!("\nContext used: {}", response.context_used);
    if let Some(question_type) = response.question_type {
        println!("Question type: {}", question_type);
    }
    if let Some(steps) = response.reasoning_steps {
        println!("\nReasoning Trace:");
        for (i, step) in steps.iter().enumerate() {
            println!("  {}: {}", i + 1, step);
        }
    }

    Ok(())
}
