//! Pagination shared by every list operation.

use serde::Deserialize;

use crate::errors::AppError;

/// Limit applied when the caller omits one.
pub const DEFAULT_PAGE_LIMIT: i64 = 5;
/// Offset applied when the caller omits one.
pub const DEFAULT_PAGE_OFFSET: i64 = 5;

/// A validated `(limit, offset)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: DEFAULT_PAGE_OFFSET,
        }
    }
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

/// Raw pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn into_page(self) -> Result<Page, AppError> {
        let defaults = Page::default();
        let limit = self.limit.unwrap_or(defaults.limit);
        let offset = self.offset.unwrap_or(defaults.offset);
        if limit < 0 || offset < 0 {
            return Err(AppError::Validation(
                "limit and offset must be non-negative".to_string(),
            ));
        }
        Ok(Page { limit, offset })
    }
}
