//! Bid use cases, including feedback left by tender owners.

use crate::db::{Bid, BidStore, FeedbackStore, IdentityResolver, TenderStore};
use crate::errors::AppError;
use crate::guard;
use crate::models::{
    validate_feedback, BidAuthor, BidContent, BidDecision, BidOrigin, BidPatch, BidStatus,
    CreateBidRequest, Feedback, Lifecycle, Page,
};

#[derive(Clone)]
pub struct BidService {
    bids: BidStore,
    tenders: TenderStore,
    feedback: FeedbackStore,
    identity: IdentityResolver,
}

impl BidService {
    pub fn new(
        bids: BidStore,
        tenders: TenderStore,
        feedback: FeedbackStore,
        identity: IdentityResolver,
    ) -> Self {
        Self {
            bids,
            tenders,
            feedback,
            identity,
        }
    }

    /// Organization a bid acts for, after checking its author still exists.
    async fn author_org(&self, author: &BidAuthor) -> Result<String, AppError> {
        match author {
            BidAuthor::Organization(org_id) => {
                if !self.identity.organization_exists(org_id).await? {
                    return Err(AppError::OrganizationNotFound(format!(
                        "organization {} does not exist",
                        org_id
                    )));
                }
            }
            BidAuthor::User(employee_id) => {
                if !self.identity.employee_exists(employee_id).await? {
                    return Err(AppError::IdentityNotFound(format!(
                        "employee {} does not exist",
                        employee_id
                    )));
                }
            }
        }
        author.effective_org(&self.identity).await
    }

    /// Place a bid on a tender. Unpublished tenders only accept bids from their
    /// own organization.
    #[tracing::instrument(skip(self, request), fields(tender = %request.tender_id))]
    pub async fn create(&self, request: CreateBidRequest) -> Result<Bid, AppError> {
        let new_bid = request.validate()?;

        let author_org = self.author_org(&new_bid.author).await?;
        let tender = self.tenders.get_latest(&new_bid.tender_id).await?;

        guard::bid_create(&author_org, &tender.head.organization_id, tender.content.status)?;

        self.bids
            .create(
                BidOrigin {
                    tender_id: new_bid.tender_id,
                    author: new_bid.author,
                },
                BidContent {
                    name: new_bid.name,
                    description: new_bid.description,
                    status: BidStatus::INITIAL,
                },
            )
            .await
    }

    /// Bids `username` authored personally.
    pub async fn list_mine(&self, username: &str, page: Page) -> Result<Vec<Bid>, AppError> {
        let employee_id = self.identity.resolve_user(username).await?;
        self.bids.list_by_user(&employee_id, page).await
    }

    /// Bids on a tender visible to `username`: published ones, plus drafts of the
    /// requester's primary organization.
    pub async fn list_for_tender(
        &self,
        tender_id: &str,
        username: &str,
        page: Page,
    ) -> Result<Vec<Bid>, AppError> {
        let requester = self.identity.requester(username).await?;
        let tender = self.tenders.get_latest(tender_id).await?;

        guard::tender_bids_read(&requester, &tender.head.organization_id, tender.content.status)?;

        let organizations: Vec<String> =
            requester.primary_org().map(String::from).into_iter().collect();
        self.bids
            .list_for_tender(tender_id, &organizations, page)
            .await
    }

    pub async fn status(&self, bid_id: &str, username: &str) -> Result<BidStatus, AppError> {
        let requester = self.identity.requester(username).await?;
        let bid = self.bids.get_latest(bid_id).await?;
        let tender = self.tenders.get_latest(&bid.head.tender_id).await?;
        let bid_org = bid.head.author.effective_org(&self.identity).await?;

        guard::bid_status_read(
            &requester,
            &bid_org,
            bid.content.status,
            &tender.head.organization_id,
        )?;
        Ok(bid.content.status)
    }

    /// Move a bid to `status`. Unlike tenders, ownership is checked before the
    /// no-op short-circuit.
    #[tracing::instrument(skip(self))]
    pub async fn change_status(
        &self,
        bid_id: &str,
        status: BidStatus,
        username: &str,
    ) -> Result<Bid, AppError> {
        let requester = self.identity.requester(username).await?;
        let current = self.bids.get_latest(bid_id).await?;
        let bid_org = current.head.author.effective_org(&self.identity).await?;

        guard::bid_write(&requester, &bid_org)?;

        if current.content.status == status {
            return Ok(current);
        }

        let mut next = current.as_version(current.version + 1);
        next.content.status = status;
        self.bids.append_version(&next).await
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn edit(&self, bid_id: &str, patch: BidPatch, username: &str) -> Result<Bid, AppError> {
        let requester = self.identity.requester(username).await?;
        let current = self.bids.get_latest(bid_id).await?;
        let bid_org = current.head.author.effective_org(&self.identity).await?;

        guard::bid_write(&requester, &bid_org)?;

        let mut next = current.as_version(current.version + 1);
        if next.content.merge(patch) == 0 {
            return Ok(current);
        }
        self.bids.append_version(&next).await
    }

    /// Decisions on bids have no aggregation rule yet.
    pub async fn submit_decision(
        &self,
        bid_id: &str,
        decision: BidDecision,
        username: &str,
    ) -> Result<Bid, AppError> {
        self.identity.resolve_user(username).await?;
        self.bids.get_latest(bid_id).await?;

        Err(AppError::NotImplemented(format!(
            "submitting {:?} decisions on bids is not supported yet",
            decision
        )))
    }

    /// Leave feedback on a published bid. Returns the bid as it stands.
    #[tracing::instrument(skip(self, body))]
    pub async fn add_feedback(
        &self,
        bid_id: &str,
        body: &str,
        username: &str,
    ) -> Result<Bid, AppError> {
        validate_feedback(body)?;

        let requester = self.identity.requester(username).await?;
        let bid = self.bids.get_latest(bid_id).await?;
        let tender = self.tenders.get_latest(&bid.head.tender_id).await?;

        guard::feedback_write(&requester, &tender.head.organization_id, bid.content.status)?;

        self.feedback
            .add(&bid.id, &requester.employee_id, body)
            .await?;
        Ok(bid)
    }

    /// Re-publish the content of `version` as a new latest version.
    #[tracing::instrument(skip(self))]
    pub async fn rollback(&self, bid_id: &str, version: i64, username: &str) -> Result<Bid, AppError> {
        let requester = self.identity.requester(username).await?;
        let historical = self.bids.get_version(bid_id, version).await?;
        let bid_org = historical.head.author.effective_org(&self.identity).await?;

        guard::bid_write(&requester, &bid_org)?;

        let latest = self.bids.get_latest_version_number(bid_id).await?;
        self.bids
            .append_version(&historical.as_version(latest + 1))
            .await
    }

    /// Feedback the tender owner left on bids authored by `author_username`.
    pub async fn reviews(
        &self,
        tender_id: &str,
        author_username: &str,
        requester_username: &str,
        page: Page,
    ) -> Result<Vec<Feedback>, AppError> {
        let requester = self.identity.requester(requester_username).await?;
        let tender = self.tenders.get_latest(tender_id).await?;

        guard::feedback_read(&requester, &tender.head.organization_id)?;

        let author = self.identity.requester(author_username).await?;
        self.feedback
            .list_for_author(tender_id, &author.employee_id, &author.organizations, page)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::TestDb;
    use crate::db::Tender;
    use crate::models::{ServiceType, TenderContent, TenderOwner, TenderStatus};

    struct World {
        db: TestDb,
        service: BidService,
        tenders: TenderStore,
        o1: String,
        o3: String,
        bob: String,
    }

    /// alice acts for O1 (the tender owner), bob and frank for O3, erin for nobody.
    async fn world() -> World {
        let db = TestDb::new().await;
        let o1 = db.organization("O1").await;
        let o3 = db.organization("O3").await;
        let alice = db.employee("alice").await;
        let bob = db.employee("bob").await;
        let frank = db.employee("frank").await;
        db.employee("erin").await;
        db.responsible(&o1, &alice).await;
        db.responsible(&o3, &bob).await;
        db.responsible(&o3, &frank).await;

        let tenders = TenderStore::new(db.pool.clone());
        let service = BidService::new(
            BidStore::new(db.pool.clone()),
            tenders.clone(),
            FeedbackStore::new(db.pool.clone()),
            IdentityResolver::new(db.pool.clone()),
        );
        World {
            db,
            service,
            tenders,
            o1,
            o3,
            bob,
        }
    }

    impl World {
        async fn tender(&self, status: TenderStatus) -> Tender {
            let created = self
                .tenders
                .create(
                    TenderOwner {
                        organization_id: self.o1.clone(),
                        creator_username: "alice".into(),
                    },
                    TenderContent {
                        name: "Road".into(),
                        description: "Paving".into(),
                        service_type: ServiceType::Construction,
                        status: TenderStatus::Created,
                    },
                )
                .await
                .unwrap();
            if status == TenderStatus::Created {
                return created;
            }
            let mut next = created.as_version(2);
            next.content.status = status;
            self.tenders.append_version(&next).await.unwrap()
        }

        fn request(&self, tender: &Tender, author_type: &str, author_id: &str) -> CreateBidRequest {
            CreateBidRequest {
                name: "Offer".into(),
                description: "Cheap and fast".into(),
                tender_id: tender.id.clone(),
                author_type: author_type.into(),
                author_id: author_id.into(),
            }
        }

        async fn published_bid(&self, tender: &Tender) -> Bid {
            let bid = self
                .service
                .create(self.request(tender, "User", &self.bob))
                .await
                .unwrap();
            self.service
                .change_status(&bid.id, BidStatus::Published, "bob")
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn outsider_cannot_bid_on_unpublished_tender() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Created).await;

        let err = w
            .service
            .create(w.request(&tender, "User", &w.bob))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // The owner may bid on its own draft
        let own = w
            .service
            .create(w.request(&tender, "Organization", &w.o1))
            .await
            .unwrap();
        assert_eq!(own.version, 1);
        assert_eq!(own.content.status, BidStatus::Created);
    }

    #[tokio::test]
    async fn create_checks_authors_exist() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;

        assert!(matches!(
            w.service.create(w.request(&tender, "Organization", "nowhere")).await,
            Err(AppError::OrganizationNotFound(_))
        ));
        assert!(matches!(
            w.service.create(w.request(&tender, "User", "nobody")).await,
            Err(AppError::IdentityNotFound(_))
        ));

        let erin_id = crate::db::IdentityResolver::new(w.db.pool.clone())
            .resolve_user("erin")
            .await
            .unwrap();
        assert!(matches!(
            w.service.create(w.request(&tender, "User", &erin_id)).await,
            Err(AppError::OrganizationNotFound(_))
        ));

        assert!(matches!(
            w.service.create(w.request(&tender, "Organization", &w.o3)).await,
            Ok(_)
        ));
    }

    #[tokio::test]
    async fn user_authored_bids_are_managed_by_the_authors_org() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        let bid = w
            .service
            .create(w.request(&tender, "User", &w.bob))
            .await
            .unwrap();

        // frank shares bob's organization
        let edited = w
            .service
            .edit(
                &bid.id,
                BidPatch {
                    name: Some("Better offer".into()),
                    description: None,
                },
                "frank",
            )
            .await
            .unwrap();
        assert_eq!(edited.version, 2);
        assert_eq!(
            w.service.status(&bid.id, "frank").await.unwrap(),
            BidStatus::Created
        );

        // The tender owner cannot see or touch a draft bid
        assert!(matches!(
            w.service.status(&bid.id, "alice").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            w.service.edit(&bid.id, BidPatch::default(), "alice").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn status_change_authorizes_before_no_op() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        let bid = w
            .service
            .create(w.request(&tender, "User", &w.bob))
            .await
            .unwrap();

        assert!(matches!(
            w.service
                .change_status(&bid.id, BidStatus::Created, "alice")
                .await,
            Err(AppError::Forbidden(_))
        ));

        let unchanged = w
            .service
            .change_status(&bid.id, BidStatus::Created, "bob")
            .await
            .unwrap();
        assert_eq!(unchanged, BidStore::new(w.db.pool.clone()).get_latest(&bid.id).await.unwrap());
        assert_eq!(unchanged.version, 1);
    }

    #[tokio::test]
    async fn tender_owner_reads_published_bid_status() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        let bid = w.published_bid(&tender).await;

        assert_eq!(
            w.service.status(&bid.id, "alice").await.unwrap(),
            BidStatus::Published
        );
        assert!(matches!(
            w.service.status(&bid.id, "erin").await,
            Err(AppError::OrganizationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn feedback_needs_a_published_bid() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        let draft = w
            .service
            .create(w.request(&tender, "User", &w.bob))
            .await
            .unwrap();

        assert!(matches!(
            w.service.add_feedback(&draft.id, "Too slow", "alice").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            w.service.add_feedback(&draft.id, "Too slow", "bob").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            w.service.add_feedback(&draft.id, "Too slow", "erin").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn reviews_list_feedback_on_author_bids() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        let bid = w.published_bid(&tender).await;

        let returned = w
            .service
            .add_feedback(&bid.id, "Too slow", "alice")
            .await
            .unwrap();
        assert_eq!(returned.id, bid.id);
        assert_eq!(returned.version, bid.version);
        w.service
            .add_feedback(&bid.id, "Good price", "alice")
            .await
            .unwrap();

        // Bids from the author's organization count too
        let org_bid = w
            .service
            .create(w.request(&tender, "Organization", &w.o3))
            .await
            .unwrap();
        w.service
            .change_status(&org_bid.id, BidStatus::Published, "frank")
            .await
            .unwrap();
        w.service
            .add_feedback(&org_bid.id, "Also fine", "alice")
            .await
            .unwrap();

        let reviews = w
            .service
            .reviews(&tender.id, "bob", "alice", Page::new(10, 0))
            .await
            .unwrap();
        let bodies: Vec<_> = reviews.iter().map(|f| f.body.as_str()).collect();
        assert_eq!(bodies, ["Also fine", "Good price", "Too slow"]);

        assert!(matches!(
            w.service
                .reviews(&tender.id, "bob", "bob", Page::new(10, 0))
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            w.service
                .reviews(&tender.id, "ghost", "alice", Page::new(10, 0))
                .await,
            Err(AppError::IdentityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_for_tender_and_mine() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        w.published_bid(&tender).await;
        w.service
            .create(w.request(&tender, "Organization", &w.o3))
            .await
            .unwrap();

        // The owner sees only the published bid, bob's org sees both
        let for_owner = w
            .service
            .list_for_tender(&tender.id, "alice", Page::new(10, 0))
            .await
            .unwrap();
        assert_eq!(for_owner.len(), 1);
        let for_bidder = w
            .service
            .list_for_tender(&tender.id, "frank", Page::new(10, 0))
            .await
            .unwrap();
        assert_eq!(for_bidder.len(), 2);

        let mine = w.service.list_mine("bob", Page::new(10, 0)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(w.service.list_mine("frank", Page::new(10, 0)).await.unwrap().is_empty());

        let draft_tender = w.tender(TenderStatus::Created).await;
        assert!(matches!(
            w.service
                .list_for_tender(&draft_tender.id, "bob", Page::new(10, 0))
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn rollback_and_decision() {
        let w = world().await;
        let tender = w.tender(TenderStatus::Published).await;
        let bid = w.published_bid(&tender).await;

        let rolled = w.service.rollback(&bid.id, 1, "bob").await.unwrap();
        assert_eq!(rolled.version, 3);
        assert_eq!(rolled.content.status, BidStatus::Created);
        assert!(matches!(
            w.service.rollback(&bid.id, 0, "bob").await,
            Err(AppError::ResourceNotFound(_))
        ));
        assert!(matches!(
            w.service.rollback(&bid.id, 1, "alice").await,
            Err(AppError::Forbidden(_))
        ));

        assert!(matches!(
            w.service
                .submit_decision(&bid.id, BidDecision::Approved, "alice")
                .await,
            Err(AppError::NotImplemented(_))
        ));
        assert!(matches!(
            w.service
                .submit_decision("missing", BidDecision::Rejected, "alice")
                .await,
            Err(AppError::ResourceNotFound(_))
        ));
    }
}
