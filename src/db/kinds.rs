//! Table layouts of tenders and bids, plus their kind-specific list queries.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::versioned::{EntityKind, SqliteQuery, VersionStore, Versioned};
use crate::errors::AppError;
use crate::models::{
    BidAuthor, BidContent, BidOrigin, BidStatus, Lifecycle, Page, ServiceType, TenderContent,
    TenderOwner, TenderStatus,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TenderKind;

#[derive(Debug, Clone, PartialEq)]
pub struct BidKind;

pub type Tender = Versioned<TenderKind>;
pub type Bid = Versioned<BidKind>;
pub type TenderStore = VersionStore<TenderKind>;
pub type BidStore = VersionStore<BidKind>;

fn corrupt(what: &str, value: &str) -> AppError {
    tracing::error!(what, value, "Unreadable stored row");
    AppError::Unexpected(format!("unknown stored {what} {value}"))
}

impl EntityKind for TenderKind {
    const LABEL: &'static str = "tender";
    const HEAD_TABLE: &'static str = "tenders";
    const VERSION_TABLE: &'static str = "tender_versions";
    const HEAD_COLUMNS: &'static [&'static str] = &["organization_id", "creator_username"];
    const CONTENT_COLUMNS: &'static [&'static str] =
        &["name", "description", "service_type", "status"];

    type Head = TenderOwner;
    type Content = TenderContent;

    fn bind_head<'q>(query: SqliteQuery<'q>, head: &TenderOwner) -> SqliteQuery<'q> {
        query
            .bind(head.organization_id.clone())
            .bind(head.creator_username.clone())
    }

    fn bind_content<'q>(query: SqliteQuery<'q>, content: &TenderContent) -> SqliteQuery<'q> {
        query
            .bind(content.name.clone())
            .bind(content.description.clone())
            .bind(content.service_type.as_str())
            .bind(content.status.stored())
    }

    fn head_from_row(row: &SqliteRow) -> Result<TenderOwner, AppError> {
        Ok(TenderOwner {
            organization_id: row.try_get("organization_id")?,
            creator_username: row.try_get("creator_username")?,
        })
    }

    fn content_from_row(row: &SqliteRow) -> Result<TenderContent, AppError> {
        let service_type: String = row.try_get("service_type")?;
        let status: String = row.try_get("status")?;

        Ok(TenderContent {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            service_type: ServiceType::parse(&service_type)
                .ok_or_else(|| corrupt("service type", &service_type))?,
            status: TenderStatus::from_stored(&status)
                .ok_or_else(|| corrupt("tender status", &status))?,
        })
    }
}

impl EntityKind for BidKind {
    const LABEL: &'static str = "bid";
    const HEAD_TABLE: &'static str = "bids";
    const VERSION_TABLE: &'static str = "bid_versions";
    const HEAD_COLUMNS: &'static [&'static str] = &["tender_id", "author_type", "author_id"];
    const CONTENT_COLUMNS: &'static [&'static str] = &["name", "description", "status"];

    type Head = BidOrigin;
    type Content = BidContent;

    fn bind_head<'q>(query: SqliteQuery<'q>, head: &BidOrigin) -> SqliteQuery<'q> {
        query
            .bind(head.tender_id.clone())
            .bind(head.author.author_type())
            .bind(head.author.author_id().to_string())
    }

    fn bind_content<'q>(query: SqliteQuery<'q>, content: &BidContent) -> SqliteQuery<'q> {
        query
            .bind(content.name.clone())
            .bind(content.description.clone())
            .bind(content.status.stored())
    }

    fn head_from_row(row: &SqliteRow) -> Result<BidOrigin, AppError> {
        let author_type: String = row.try_get("author_type")?;
        let author = BidAuthor::parse(&author_type, row.try_get("author_id")?)
            .ok_or_else(|| corrupt("author type", &author_type))?;

        Ok(BidOrigin {
            tender_id: row.try_get("tender_id")?,
            author,
        })
    }

    fn content_from_row(row: &SqliteRow) -> Result<BidContent, AppError> {
        let status: String = row.try_get("status")?;

        Ok(BidContent {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: BidStatus::from_stored(&status).ok_or_else(|| corrupt("bid status", &status))?,
        })
    }
}

/// SQL expression for the organization a bid row `h` effectively acts for.
///
/// Organization-authored bids act for their author; user-authored bids act for the
/// first organization the author is responsible for.
const BID_EFFECTIVE_ORG: &str = "CASE h.author_type \
     WHEN 'Organization' THEN h.author_id \
     ELSE (SELECT r.organization_id FROM organization_responsible AS r \
           WHERE r.user_id = h.author_id ORDER BY r.rowid LIMIT 1) END";

impl VersionStore<TenderKind> {
    /// Tenders in any status, optionally restricted to a set of service types.
    pub async fn list_all(
        &self,
        service_types: &[ServiceType],
        page: Page,
    ) -> Result<Vec<Tender>, AppError> {
        let service_types = service_types.to_vec();
        self.list_latest(page, move |builder| {
            if !service_types.is_empty() {
                builder.push(" AND v.service_type IN (");
                let mut separated = builder.separated(", ");
                for service_type in service_types {
                    separated.push_bind(service_type.as_str());
                }
                separated.push_unseparated(")");
            }
        })
        .await
    }

    /// Tenders created by `username`, in any status.
    pub async fn list_by_creator(&self, username: &str, page: Page) -> Result<Vec<Tender>, AppError> {
        let username = username.to_string();
        self.list_latest(page, move |builder| {
            builder.push(" AND h.creator_username = ").push_bind(username);
        })
        .await
    }
}

impl VersionStore<BidKind> {
    /// Bids the employee authored personally.
    pub async fn list_by_user(&self, employee_id: &str, page: Page) -> Result<Vec<Bid>, AppError> {
        let employee_id = employee_id.to_string();
        self.list_latest(page, move |builder| {
            builder
                .push(" AND h.author_type = ")
                .push_bind(BidAuthor::USER)
                .push(" AND h.author_id = ")
                .push_bind(employee_id);
        })
        .await
    }

    /// Bids on a tender that are either published or act for one of `organizations`.
    pub async fn list_for_tender(
        &self,
        tender_id: &str,
        organizations: &[String],
        page: Page,
    ) -> Result<Vec<Bid>, AppError> {
        let tender_id = tender_id.to_string();
        let organizations = organizations.to_vec();
        self.list_latest(page, move |builder| {
            builder
                .push(" AND h.tender_id = ")
                .push_bind(tender_id)
                .push(" AND (v.status = ")
                .push_bind(BidStatus::Published.stored());
            if !organizations.is_empty() {
                builder.push(format!(" OR ({BID_EFFECTIVE_ORG}) IN ("));
                let mut separated = builder.separated(", ");
                for org in organizations {
                    separated.push_bind(org);
                }
                separated.push_unseparated(")");
            }
            builder.push(")");
        })
        .await
    }
}
