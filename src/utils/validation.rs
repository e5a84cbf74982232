//! Input validation utilities

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use validator::ValidationError;

use crate::constants;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Validate programming language
pub fn validate_language(language: &str) -> Result<(), ValidationError> {
    if constants::languages::ALL.contains(&language) {
        Ok(())
    } else {
        Err(error("language", "Unsupported programming language"))
    }
}

/// Validate that a scheduled moment lies in the future
pub fn validate_future_moment(moment: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *moment > Utc::now() {
        Ok(())
    } else {
        Err(error("starting_at", "Starting moment must be in the future"))
    }
}

/// Validate an exam owner identifier
pub fn validate_owner(owner: &str) -> Result<(), &'static str> {
    if owner.trim().is_empty() {
        return Err("Owner cannot be blank");
    }
    if owner.len() > constants::MAX_OWNER_LENGTH {
        return Err("Owner must be at most 128 characters");
    }
    if owner.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err("Owner cannot contain whitespace or control characters");
    }
    Ok(())
}
