//! Bid API endpoints.
//!
//! Bid routes share the `{id}` path segment; depending on the route it holds a
//! bid id or a tender id.

use axum::extract::{Path, State};
use serde::Deserialize;

use super::tenders::{StatusChangeQuery, UserPageQuery, UserQuery};
use super::{required, success, version_param, ApiJson, ApiQuery, ApiResult, BidView};
use crate::errors::AppError;
use crate::models::{
    validate_feedback, BidDecision, BidStatus, CreateBidRequest, EditBidRequest, Feedback,
    Lifecycle, PageQuery,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub decision: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    pub bid_feedback: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
    pub author_username: Option<String>,
    pub requester_username: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/bids/new - Place a bid.
pub async fn create_bid(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateBidRequest>,
) -> ApiResult<BidView> {
    let bid = state
        .bids
        .create(request)
        .await
        .map_err(|e| state.reject(e))?;

    success(BidView::from(&bid))
}

/// GET /api/bids/my - Bids the user authored personally.
pub async fn my_bids(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserPageQuery>,
) -> ApiResult<Vec<BidView>> {
    let username = required("username", query.username)?;
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .into_page()?;

    let bids = state
        .bids
        .list_mine(&username, page)
        .await
        .map_err(|e| state.reject(e))?;

    success(bids.iter().map(BidView::from).collect())
}

/// GET /api/bids/{tender_id}/list - Bids placed on a tender.
pub async fn tender_bids(
    State(state): State<AppState>,
    Path(tender_id): Path<String>,
    ApiQuery(query): ApiQuery<UserPageQuery>,
) -> ApiResult<Vec<BidView>> {
    let username = required("username", query.username)?;
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .into_page()?;

    let bids = state
        .bids
        .list_for_tender(&tender_id, &username, page)
        .await
        .map_err(|e| state.reject(e))?;

    success(bids.iter().map(BidView::from).collect())
}

/// GET /api/bids/{id}/status - Current status of a bid.
pub async fn get_bid_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<&'static str> {
    let username = required("username", query.username)?;

    let status = state
        .bids
        .status(&id, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(status.presented())
}

/// PUT /api/bids/{id}/status - Change the status of a bid.
pub async fn update_bid_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<StatusChangeQuery>,
) -> ApiResult<BidView> {
    let raw = required("status", query.status)?;
    let status = BidStatus::from_presented(&raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown bid status {}", raw)))?;
    let username = required("username", query.username)?;

    let bid = state
        .bids
        .change_status(&id, status, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(BidView::from(&bid))
}

/// PATCH /api/bids/{id}/edit - Partially edit a bid.
pub async fn edit_bid(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
    ApiJson(request): ApiJson<EditBidRequest>,
) -> ApiResult<BidView> {
    let username = required("username", query.username)?;
    let patch = request.validate()?;

    let bid = state
        .bids
        .edit(&id, patch, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(BidView::from(&bid))
}

/// PUT /api/bids/{id}/submit_decision - Approve or reject a bid.
pub async fn submit_decision(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<DecisionQuery>,
) -> ApiResult<BidView> {
    let raw = required("decision", query.decision)?;
    let decision = BidDecision::parse(&raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown decision {}", raw)))?;
    let username = required("username", query.username)?;

    let bid = state
        .bids
        .submit_decision(&id, decision, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(BidView::from(&bid))
}

/// PUT /api/bids/{id}/feedback - Leave feedback on a published bid.
pub async fn add_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<FeedbackQuery>,
) -> ApiResult<BidView> {
    let body = query.bid_feedback.unwrap_or_default();
    validate_feedback(&body)?;
    let username = required("username", query.username)?;

    let bid = state
        .bids
        .add_feedback(&id, &body, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(BidView::from(&bid))
}

/// PUT /api/bids/{id}/rollback/{version} - Re-publish an older version.
pub async fn rollback_bid(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, String)>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<BidView> {
    let version = version_param(&version, 0)?;
    let username = required("username", query.username)?;

    let bid = state
        .bids
        .rollback(&id, version, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(BidView::from(&bid))
}

/// GET /api/bids/{tender_id}/reviews - Feedback left on an author's bids.
pub async fn reviews(
    State(state): State<AppState>,
    Path(tender_id): Path<String>,
    ApiQuery(query): ApiQuery<ReviewsQuery>,
) -> ApiResult<Vec<Feedback>> {
    let author = required("authorUsername", query.author_username)?;
    let requester = required("requesterUsername", query.requester_username)?;
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .into_page()?;

    let feedback = state
        .bids
        .reviews(&tender_id, &author, &requester, page)
        .await
        .map_err(|e| state.reject(e))?;

    success(feedback)
}
