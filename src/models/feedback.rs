//! Feedback left by a tender owner on a published bid.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::check_length;
use crate::errors::AppError;

/// Maximum feedback length.
pub const MAX_FEEDBACK_LEN: usize = 1000;

/// An immutable feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    #[serde(rename = "description")]
    pub body: String,
    #[serde(skip)]
    pub bid_id: String,
    #[serde(skip)]
    pub author_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Validate a feedback body before it reaches the store.
pub fn validate_feedback(body: &str) -> Result<(), AppError> {
    check_length("bidFeedback", body, 1, MAX_FEEDBACK_LEN)
}
