//! Authorization rules for tenders, bids and feedback.
//!
//! Every rule is a pure function over an already-resolved requester and the
//! already-fetched entity. Services resolve identity and load data first, then
//! ask the guard, then write.

use crate::errors::AppError;
use crate::models::{BidStatus, Lifecycle, TenderStatus};

/// A resolved username and every organization it may act for, in link order.
///
/// Writes accept any of the organizations. Reads and feedback are decided on
/// the primary (first linked) organization only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub username: String,
    pub employee_id: String,
    pub organizations: Vec<String>,
}

impl Requester {
    pub fn acts_for(&self, organization_id: &str) -> bool {
        self.organizations.iter().any(|org| org == organization_id)
    }

    /// The organization the requester resolves to on reads: its first link.
    pub fn primary_org(&self) -> Option<&str> {
        self.organizations.first().map(String::as_str)
    }

    fn no_org(&self) -> AppError {
        AppError::OrganizationNotFound(format!(
            "user {} is not responsible for any organization",
            self.username
        ))
    }

    fn denied(&self, action: &str) -> AppError {
        AppError::Forbidden(format!(
            "user {} is not allowed to {}",
            self.username, action
        ))
    }

    /// Allowed when any of the requester's organizations is `organization_id`.
    fn require_any(&self, organization_id: &str, action: &str) -> Result<(), AppError> {
        if self.organizations.is_empty() {
            return Err(self.no_org());
        }
        if !self.acts_for(organization_id) {
            return Err(self.denied(action));
        }
        Ok(())
    }

    /// Allowed only when the primary organization is `organization_id`.
    fn require_primary(&self, organization_id: &str, action: &str) -> Result<(), AppError> {
        match self.primary_org() {
            None => Err(self.no_org()),
            Some(org) if org == organization_id => Ok(()),
            Some(_) => Err(self.denied(action)),
        }
    }
}

/// Owners may always read a tender's status; everybody may once it is published.
pub fn tender_status_read(
    requester: &Requester,
    tender_org: &str,
    status: TenderStatus,
) -> Result<(), AppError> {
    if status.is_published() {
        return Ok(());
    }
    requester.require_primary(tender_org, "view this tender")
}

/// Edit, status change and rollback of a tender.
pub fn tender_write(requester: &Requester, tender_org: &str) -> Result<(), AppError> {
    requester.require_any(tender_org, "modify this tender")
}

/// An author may bid on any published tender, and on its own tender in any status.
pub fn bid_create(
    author_org: &str,
    tender_org: &str,
    tender_status: TenderStatus,
) -> Result<(), AppError> {
    if tender_status.is_published() || author_org == tender_org {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "organization {} cannot bid on an unpublished tender",
        author_org
    )))
}

/// Listing the bids placed on a tender.
pub fn tender_bids_read(
    requester: &Requester,
    tender_org: &str,
    tender_status: TenderStatus,
) -> Result<(), AppError> {
    if tender_status.is_published() {
        return Ok(());
    }
    requester.require_primary(tender_org, "view bids of this tender")
}

/// Edit, status change and rollback of a bid, decided on the bid's effective org.
pub fn bid_write(requester: &Requester, bid_org: &str) -> Result<(), AppError> {
    requester.require_any(bid_org, "modify this bid")
}

/// Bid status read: the bid's own org, or the tender owner once the bid is published.
pub fn bid_status_read(
    requester: &Requester,
    bid_org: &str,
    bid_status: BidStatus,
    tender_org: &str,
) -> Result<(), AppError> {
    if bid_status.is_published() && requester.primary_org() == Some(tender_org) {
        return Ok(());
    }
    requester.require_primary(bid_org, "view this bid")
}

/// Only the tender owner leaves feedback, and only on published bids.
pub fn feedback_write(
    requester: &Requester,
    tender_org: &str,
    bid_status: BidStatus,
) -> Result<(), AppError> {
    if !bid_status.is_published() {
        return Err(AppError::Forbidden(
            "feedback is only accepted on published bids".to_string(),
        ));
    }
    requester.require_primary(tender_org, "leave feedback on this bid")
}

/// Only the tender owner reads reviews of its bidders.
pub fn feedback_read(requester: &Requester, tender_org: &str) -> Result<(), AppError> {
    requester.require_primary(tender_org, "read reviews for this tender")
}
