//! Tender use cases.

use crate::db::{IdentityResolver, Tender, TenderStore};
use crate::errors::AppError;
use crate::guard;
use crate::models::{
    CreateTenderRequest, Lifecycle, Page, ServiceType, TenderContent, TenderOwner, TenderPatch,
    TenderStatus,
};

#[derive(Clone)]
pub struct TenderService {
    tenders: TenderStore,
    identity: IdentityResolver,
}

impl TenderService {
    pub fn new(tenders: TenderStore, identity: IdentityResolver) -> Self {
        Self { tenders, identity }
    }

    /// Latest versions of all tenders, optionally filtered by service type.
    pub async fn list(
        &self,
        service_types: &[ServiceType],
        page: Page,
    ) -> Result<Vec<Tender>, AppError> {
        self.tenders.list_all(service_types, page).await
    }

    /// Create a tender on behalf of an organization the creator is responsible for.
    #[tracing::instrument(skip(self, request), fields(org = %request.organization_id))]
    pub async fn create(&self, request: CreateTenderRequest) -> Result<Tender, AppError> {
        let service_type = request.validate()?;

        let employee_id = self.identity.resolve_user(&request.creator_username).await?;
        if !self
            .identity
            .is_responsible_for(&employee_id, &request.organization_id)
            .await?
        {
            return Err(AppError::Forbidden(format!(
                "user {} is not responsible for organization {}",
                request.creator_username, request.organization_id
            )));
        }

        self.tenders
            .create(
                TenderOwner {
                    organization_id: request.organization_id,
                    creator_username: request.creator_username,
                },
                TenderContent {
                    name: request.name,
                    description: request.description,
                    service_type,
                    status: TenderStatus::INITIAL,
                },
            )
            .await
    }

    /// Tenders created by `username`.
    pub async fn list_mine(&self, username: &str, page: Page) -> Result<Vec<Tender>, AppError> {
        self.identity.resolve_user(username).await?;
        self.tenders.list_by_creator(username, page).await
    }

    pub async fn status(&self, tender_id: &str, username: &str) -> Result<TenderStatus, AppError> {
        let requester = self.identity.requester(username).await?;
        let tender = self.tenders.get_latest(tender_id).await?;

        guard::tender_status_read(&requester, &tender.head.organization_id, tender.content.status)?;
        Ok(tender.content.status)
    }

    /// Move a tender to `status`. Asking for the current status is a no-op that
    /// needs no ownership.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(
        &self,
        tender_id: &str,
        status: TenderStatus,
        username: &str,
    ) -> Result<Tender, AppError> {
        let requester = self.identity.requester(username).await?;
        let current = self.tenders.get_latest(tender_id).await?;

        if current.content.status == status {
            return Ok(current);
        }

        guard::tender_write(&requester, &current.head.organization_id)?;

        let mut next = current.as_version(current.version + 1);
        next.content.status = status;
        self.tenders.append_version(&next).await
    }

    /// Apply a partial edit. Nothing is written when no field actually changes.
    #[tracing::instrument(skip(self, patch))]
    pub async fn edit(
        &self,
        tender_id: &str,
        patch: TenderPatch,
        username: &str,
    ) -> Result<Tender, AppError> {
        let requester = self.identity.requester(username).await?;
        let current = self.tenders.get_latest(tender_id).await?;

        guard::tender_write(&requester, &current.head.organization_id)?;

        let mut next = current.as_version(current.version + 1);
        if next.content.merge(patch) == 0 {
            return Ok(current);
        }
        self.tenders.append_version(&next).await
    }

    /// Re-publish the content of `version` as a new latest version.
    #[tracing::instrument(skip(self))]
    pub async fn rollback(
        &self,
        tender_id: &str,
        version: i64,
        username: &str,
    ) -> Result<Tender, AppError> {
        let requester = self.identity.requester(username).await?;
        let historical = self.tenders.get_version(tender_id, version).await?;

        guard::tender_write(&requester, &historical.head.organization_id)?;

        let latest = self.tenders.get_latest_version_number(tender_id).await?;
        self.tenders
            .append_version(&historical.as_version(latest + 1))
            .await
    }
}
