//! Error types for the TakaTrack service

use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Field name → messages, rendered as the `errors` object of a 422 response
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum TrackerError {

    // =============================
    // Request Errors
    // =============================

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // =============================
    // Dependency Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TrackerError {
    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        TrackerError::Validation(errors)
    }

    pub fn not_found(resource: &str) -> Self {
        TrackerError::NotFound(format!("{} not found", resource))
    }

    pub fn not_owner(resource: &str) -> Self {
        TrackerError::Forbidden(format!("You do not own this {}", resource))
    }
}

impl From<sqlx::Error> for TrackerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => TrackerError::NotFound("Record not found".to_string()),
            other => TrackerError::DatabaseError(other.to_string()),
        }
    }
}

/// Collects field errors while validating a request payload
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        }
        self
    }

    pub fn require_text(&mut self, value: &str, field: &str, max_len: usize) -> &mut Self {
        let trimmed = value.trim();
        self.check(!trimmed.is_empty(), field, &format!("The {} field is required.", field));
        self.check(
            trimmed.chars().count() <= max_len,
            field,
            &format!("The {} may not be greater than {} characters.", field, max_len),
        )
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(TrackerError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}
