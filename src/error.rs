//! Unified error type
//!
//! Built with `thiserror`: one `AppError` enum plus the `AppResult` alias.
//! `AppError::kind` maps each variant onto the handling taxonomy used by the
//! request path and the job queue.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input or missing job arguments. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {entity} (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An external capability (embedding, generation, mail) failed or timed out.
    #[error("dependency failed: {0}")]
    Dependency(String),

    #[error("vector length mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Taxonomy label. Store failures count as dependency failures.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::DimensionMismatch { .. } => "validation",
            AppError::NotFound { .. } => "not_found",
            AppError::Dependency(_) | AppError::Database(_) | AppError::Io(_) => "dependency",
            AppError::Cache(_) => "cache",
            AppError::Config(_) | AppError::Migrate(_) => "config",
            AppError::Serialization(_) => "serialization",
        }
    }

    /// Whether the queue should hand the job back for redelivery.
    pub fn is_retryable(&self) -> bool {
        self.kind() == "dependency"
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("type", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Context helpers for turning foreign errors into `AppError`.
pub trait ResultExt<T> {
    fn validation_err(self, msg: &str) -> AppResult<T>;

    fn config_err(self, msg: &str) -> AppResult<T>;

    fn dependency_err(self, msg: &str) -> AppResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn validation_err(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Validation(format!("{}: {}", msg, e)))
    }

    fn config_err(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Config(format!("{}: {}", msg, e)))
    }

    fn dependency_err(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Dependency(format!("{}: {}", msg, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_type_and_message() {
        let err = AppError::not_found("document", "p1");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["type"], "not_found");
        assert_eq!(value["message"], "not found: document (id=p1)");
    }

    #[test]
    fn only_dependency_errors_are_retryable() {
        assert!(AppError::Dependency("timeout".into()).is_retryable());
        assert!(!AppError::Validation("missing post_id".into()).is_retryable());
        assert!(!AppError::not_found("document", "p1").is_retryable());
        assert!(!AppError::DimensionMismatch { left: 3, right: 4 }.is_retryable());
    }

    #[test]
    fn result_ext_wraps_display() {
        let res: Result<(), &str> = Err("boom");
        match res.dependency_err("gemini embed") {
            Err(AppError::Dependency(msg)) => assert_eq!(msg, "gemini embed: boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
