//! Domain models for the tender marketplace.
//!
//! Versioned entities are split into the columns fixed at creation (owner/origin)
//! and the content copied into every version row.

mod bid;
mod feedback;
mod page;
mod status;
mod tender;

pub use bid::*;
pub use feedback::*;
pub use page::*;
pub use status::*;
pub use tender::*;

use crate::errors::AppError;

/// Maximum length of entity names.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum length of identifiers and usernames accepted from callers.
pub const MAX_ID_LEN: usize = 100;

/// Check a text field's length in characters.
pub(crate) fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}
