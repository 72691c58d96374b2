// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Poll input validation.
//!
//! Validation failures are collected per field so callers can report every
//! problem in one round trip rather than the first one hit.

use livepoll_common::{CreatePollInput, FieldError};

use crate::error::AppError;

// Common validation constants
pub const MIN_QUESTION_LENGTH: usize = 5;
pub const MAX_QUESTION_LENGTH: usize = 500;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;
pub const MIN_OPTION_LENGTH: usize = 1;
pub const MAX_OPTION_LENGTH: usize = 200;

/// Validate a create-poll request, collecting every field failure.
pub fn validate_create_poll(input: &CreatePollInput) -> Result<(), AppError> {
    let mut errors = Vec::new();

    let question_len = input.question.chars().count();
    if question_len < MIN_QUESTION_LENGTH {
        errors.push(FieldError::new(
            "question",
            format!("Question must be at least {MIN_QUESTION_LENGTH} characters"),
        ));
    } else if question_len > MAX_QUESTION_LENGTH {
        errors.push(FieldError::new(
            "question",
            format!("Question must be at most {MAX_QUESTION_LENGTH} characters"),
        ));
    }

    if let Some(description) = &input.description {
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            errors.push(FieldError::new(
                "description",
                format!("Description must be at most {MAX_DESCRIPTION_LENGTH} characters"),
            ));
        }
    }

    if input.options.len() < MIN_OPTIONS {
        errors.push(FieldError::new(
            "options",
            format!("A poll needs at least {MIN_OPTIONS} options"),
        ));
    } else if input.options.len() > MAX_OPTIONS {
        errors.push(FieldError::new(
            "options",
            format!("A poll can have at most {MAX_OPTIONS} options"),
        ));
    }

    for (idx, option) in input.options.iter().enumerate() {
        let len = option.chars().count();
        if len < MIN_OPTION_LENGTH {
            errors.push(FieldError::new(
                format!("options[{idx}]"),
                "Option text must not be empty",
            ));
        } else if len > MAX_OPTION_LENGTH {
            errors.push(FieldError::new(
                format!("options[{idx}]"),
                format!("Option text must be at most {MAX_OPTION_LENGTH} characters"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
