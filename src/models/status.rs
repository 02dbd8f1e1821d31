//! Lifecycle statuses of versioned entities.
//!
//! Statuses are persisted upper-cased (`PUBLISHED`) and presented to callers in
//! mixed case (`Published`). Both spellings come from one mapping table per type so
//! no-op detection always compares the same representation.

use serde::{Deserialize, Serialize};

/// A status enum backed by an explicit stored/presented mapping table.
pub trait Lifecycle: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// `(variant, stored form, presented form)` for every variant.
    const MAPPING: &'static [(Self, &'static str, &'static str)];
    /// Status of version 1 of every new entity.
    const INITIAL: Self;
    /// Status that makes an entity visible outside its owning organization.
    const PUBLISHED: Self;

    fn stored(self) -> &'static str {
        Self::MAPPING
            .iter()
            .find(|(variant, _, _)| *variant == self)
            .map(|(_, stored, _)| *stored)
            .unwrap_or_default()
    }

    fn presented(self) -> &'static str {
        Self::MAPPING
            .iter()
            .find(|(variant, _, _)| *variant == self)
            .map(|(_, _, presented)| *presented)
            .unwrap_or_default()
    }

    fn from_stored(value: &str) -> Option<Self> {
        Self::MAPPING
            .iter()
            .find(|(_, stored, _)| *stored == value)
            .map(|(variant, _, _)| *variant)
    }

    fn from_presented(value: &str) -> Option<Self> {
        Self::MAPPING
            .iter()
            .find(|(_, _, presented)| *presented == value)
            .map(|(variant, _, _)| *variant)
    }

    fn is_published(self) -> bool {
        self == Self::PUBLISHED
    }
}

/// Tender lifecycle: Created -> Published -> Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderStatus {
    Created,
    Published,
    Closed,
}

impl Lifecycle for TenderStatus {
    const MAPPING: &'static [(Self, &'static str, &'static str)] = &[
        (TenderStatus::Created, "CREATED", "Created"),
        (TenderStatus::Published, "PUBLISHED", "Published"),
        (TenderStatus::Closed, "CLOSED", "Closed"),
    ];
    const INITIAL: Self = TenderStatus::Created;
    const PUBLISHED: Self = TenderStatus::Published;
}

/// Bid lifecycle: Created -> Published -> Canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    Created,
    Published,
    Canceled,
}

impl Lifecycle for BidStatus {
    const MAPPING: &'static [(Self, &'static str, &'static str)] = &[
        (BidStatus::Created, "CREATED", "Created"),
        (BidStatus::Published, "PUBLISHED", "Published"),
        (BidStatus::Canceled, "CANCELED", "Canceled"),
    ];
    const INITIAL: Self = BidStatus::Created;
    const PUBLISHED: Self = BidStatus::Published;
}
