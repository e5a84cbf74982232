//! Utility functions

pub mod validation;

pub use validation::{validate_future_moment, validate_language, validate_owner};
