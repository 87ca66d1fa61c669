//! Shared input validation
//!
//! Used by the request path and by job producers/middleware so both reject
//! the same inputs with the same message.

use crate::db::JobArgs;
use crate::error::{AppError, AppResult};

/// Returns the trimmed value, or a validation error naming `field_name`.
pub fn validate_not_empty<'a>(value: &'a str, field_name: &str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field_name)));
    }
    Ok(trimmed)
}

/// Extracts a required, non-empty job argument.
pub fn require_arg<'a>(args: &'a JobArgs, key: &str) -> AppResult<&'a str> {
    let value = args
        .get(key)
        .ok_or_else(|| AppError::Validation(format!("missing job argument {}", key)))?;
    validate_not_empty(value, key)
}

/// Loose shape check for an email address; delivery is the mail provider's call.
pub fn validate_email(raw: &str) -> AppResult<&str> {
    let email = validate_not_empty(raw, "email")?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation(format!("invalid email address: {}", email))),
    }
}
