//! TakaTrack
//!
//! A personal-finance tracking service that:
//! - Manages transactions, accounts, categories, budgets and goals
//! - Answers money questions with the user's last 30 days as context
//! - Falls back to canned advice whenever the model is slow or down
//! - Rewards daily logging with streaks, levels, badges and spins
//! - Serves a small CMS gated by role capabilities
//!
//! ADVICE PATH:
//! QUICK RESPONSE → CLASSIFY → (SINGLE CALL | WORKFLOW) → SIMILARITY → PERSIST

pub mod advice;
pub mod api;
pub mod audit;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod gamification;
pub mod ledger;
pub mod llm;
pub mod models;
pub mod pagination;
pub mod prompt;
pub mod quick_response;
pub mod random;
pub mod reports;
pub mod similarity;
pub mod store;
pub mod workflow;

pub use error::Result;

// Re-export common types
pub use error::TrackerError;
pub use models::*;
