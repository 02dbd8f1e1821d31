//! Bid model: the author indirection plus the per-version content.

use serde::{Deserialize, Serialize};

use super::{check_length, BidStatus, MAX_ID_LEN, MAX_NAME_LEN};
use crate::errors::AppError;

/// Maximum bid description length.
pub const MAX_BID_DESCRIPTION_LEN: usize = 1000;

/// Who submitted a bid. The id is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidAuthor {
    /// The organization acts directly.
    Organization(String),
    /// An employee acts for whichever organization they are responsible for.
    User(String),
}

impl BidAuthor {
    pub const ORGANIZATION: &'static str = "Organization";
    pub const USER: &'static str = "User";

    pub fn parse(author_type: &str, author_id: String) -> Option<Self> {
        match author_type {
            Self::ORGANIZATION => Some(BidAuthor::Organization(author_id)),
            Self::USER => Some(BidAuthor::User(author_id)),
            _ => None,
        }
    }

    pub fn author_type(&self) -> &'static str {
        match self {
            BidAuthor::Organization(_) => Self::ORGANIZATION,
            BidAuthor::User(_) => Self::USER,
        }
    }

    pub fn author_id(&self) -> &str {
        match self {
            BidAuthor::Organization(id) | BidAuthor::User(id) => id,
        }
    }
}

/// Columns written once at creation and never versioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidOrigin {
    pub tender_id: String,
    pub author: BidAuthor,
}

/// Fields carried by every bid version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidContent {
    pub name: String,
    pub description: String,
    pub status: BidStatus,
}

/// Outcome a tender owner may submit for a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidDecision {
    Approved,
    Rejected,
}

impl BidDecision {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Approved" => Some(BidDecision::Approved),
            "Rejected" => Some(BidDecision::Rejected),
            _ => None,
        }
    }
}

/// Request body for creating a bid.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBidRequest {
    pub name: String,
    pub description: String,
    pub tender_id: String,
    pub author_type: String,
    pub author_id: String,
}

/// A validated bid creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBid {
    pub name: String,
    pub description: String,
    pub tender_id: String,
    pub author: BidAuthor,
}

impl CreateBidRequest {
    pub fn validate(self) -> Result<NewBid, AppError> {
        check_length("name", &self.name, 1, MAX_NAME_LEN)?;
        check_length("description", &self.description, 1, MAX_BID_DESCRIPTION_LEN)?;
        check_length("tenderId", &self.tender_id, 1, MAX_ID_LEN)?;
        check_length("authorId", &self.author_id, 1, MAX_ID_LEN)?;
        let author = BidAuthor::parse(&self.author_type, self.author_id).ok_or_else(|| {
            AppError::Validation(format!("Unknown author type {}", self.author_type))
        })?;

        Ok(NewBid {
            name: self.name,
            description: self.description,
            tender_id: self.tender_id,
            author,
        })
    }
}

/// Request body for editing a bid. Empty fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBidRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A validated partial bid edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl EditBidRequest {
    pub fn validate(self) -> Result<BidPatch, AppError> {
        if !self.name.is_empty() {
            check_length("name", &self.name, 1, MAX_NAME_LEN)?;
        }
        if !self.description.is_empty() {
            check_length("description", &self.description, 1, MAX_BID_DESCRIPTION_LEN)?;
        }

        Ok(BidPatch {
            name: Some(self.name).filter(|s| !s.is_empty()),
            description: Some(self.description).filter(|s| !s.is_empty()),
        })
    }
}

impl BidContent {
    /// Apply every patch field that is present and differs from the current value.
    /// Returns the number of fields that changed.
    pub fn merge(&mut self, patch: BidPatch) -> usize {
        let mut changed = 0;
        if let Some(name) = patch.name {
            if name != self.name {
                self.name = name;
                changed += 1;
            }
        }
        if let Some(description) = patch.description {
            if description != self.description {
                self.description = description;
                changed += 1;
            }
        }
        changed
    }
}
