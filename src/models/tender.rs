//! Tender model: fixed ownership columns plus the per-version content.

use serde::{Deserialize, Serialize};

use super::{check_length, TenderStatus, MAX_ID_LEN, MAX_NAME_LEN};
use crate::errors::AppError;

/// Maximum tender description length.
pub const MAX_TENDER_DESCRIPTION_LEN: usize = 500;

/// Kind of service a tender procures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceType {
    Construction,
    Delivery,
    Manufacture,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Construction => "Construction",
            ServiceType::Delivery => "Delivery",
            ServiceType::Manufacture => "Manufacture",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Construction" => Some(ServiceType::Construction),
            "Delivery" => Some(ServiceType::Delivery),
            "Manufacture" => Some(ServiceType::Manufacture),
            _ => None,
        }
    }
}

/// Columns written once at creation and never versioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderOwner {
    pub organization_id: String,
    pub creator_username: String,
}

/// Fields carried by every tender version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderContent {
    pub name: String,
    pub description: String,
    pub service_type: ServiceType,
    pub status: TenderStatus,
}

/// Request body for creating a tender.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenderRequest {
    pub name: String,
    pub description: String,
    pub service_type: String,
    pub organization_id: String,
    pub creator_username: String,
}

impl CreateTenderRequest {
    /// Validate the request shape and resolve the service type.
    pub fn validate(&self) -> Result<ServiceType, AppError> {
        check_length("name", &self.name, 1, MAX_NAME_LEN)?;
        check_length(
            "description",
            &self.description,
            1,
            MAX_TENDER_DESCRIPTION_LEN,
        )?;
        check_length("organizationId", &self.organization_id, 1, MAX_ID_LEN)?;
        check_length("creatorUsername", &self.creator_username, 1, MAX_ID_LEN)?;
        ServiceType::parse(&self.service_type).ok_or_else(|| {
            AppError::Validation(format!("Unknown service type {}", self.service_type))
        })
    }
}

/// Request body for editing a tender. Empty fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTenderRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub service_type: String,
}

/// A validated partial tender edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenderPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub service_type: Option<ServiceType>,
}

impl EditTenderRequest {
    pub fn validate(self) -> Result<TenderPatch, AppError> {
        if !self.name.is_empty() {
            check_length("name", &self.name, 1, MAX_NAME_LEN)?;
        }
        if !self.description.is_empty() {
            check_length(
                "description",
                &self.description,
                1,
                MAX_TENDER_DESCRIPTION_LEN,
            )?;
        }
        let service_type = if self.service_type.is_empty() {
            None
        } else {
            Some(ServiceType::parse(&self.service_type).ok_or_else(|| {
                AppError::Validation(format!("Unknown service type {}", self.service_type))
            })?)
        };

        Ok(TenderPatch {
            name: Some(self.name).filter(|s| !s.is_empty()),
            description: Some(self.description).filter(|s| !s.is_empty()),
            service_type,
        })
    }
}

impl TenderContent {
    /// Apply every patch field that is present and differs from the current value.
    /// Returns the number of fields that changed.
    pub fn merge(&mut self, patch: TenderPatch) -> usize {
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
        if let Some(service_type) = patch.service_type {
            if service_type != self.service_type {
                self.service_type = service_type;
                changed += 1;
            }
        }
        changed
    }
}
