//! Tender API endpoints.

use axum::extract::{Path, State};
use serde::Deserialize;

use super::{required, success, version_param, ApiJson, ApiQuery, ApiResult, TenderView};
use crate::errors::AppError;
use crate::models::{
    CreateTenderRequest, EditTenderRequest, Lifecycle, PageQuery, ServiceType, TenderStatus,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserPageQuery {
    pub username: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeQuery {
    pub status: Option<String>,
    pub username: Option<String>,
}

fn parse_count(name: &str, raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("{} must be an integer", name)))
}

/// GET /api/ping - Liveness probe.
pub async fn ping() -> ApiResult<&'static str> {
    success("ok")
}

/// GET /api/tenders - List tenders, with repeatable `service_type` filters.
pub async fn list_tenders(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<Vec<(String, String)>>,
) -> ApiResult<Vec<TenderView>> {
    let mut service_types = Vec::new();
    let mut page = PageQuery::default();

    for (key, value) in params {
        match key.as_str() {
            "service_type" => service_types.push(ServiceType::parse(&value).ok_or_else(|| {
                AppError::Validation(format!("Unknown service type {}", value))
            })?),
            "limit" => page.limit = Some(parse_count("limit", &value)?),
            "offset" => page.offset = Some(parse_count("offset", &value)?),
            _ => {}
        }
    }

    let tenders = state
        .tenders
        .list(&service_types, page.into_page()?)
        .await
        .map_err(|e| state.reject(e))?;

    success(tenders.iter().map(TenderView::from).collect())
}

/// POST /api/tenders/new - Create a tender.
pub async fn create_tender(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTenderRequest>,
) -> ApiResult<TenderView> {
    let tender = state
        .tenders
        .create(request)
        .await
        .map_err(|e| state.reject(e))?;

    success(TenderView::from(&tender))
}

/// GET /api/tenders/my - Tenders created by the user.
pub async fn my_tenders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserPageQuery>,
) -> ApiResult<Vec<TenderView>> {
    let username = required("username", query.username)?;
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .into_page()?;

    let tenders = state
        .tenders
        .list_mine(&username, page)
        .await
        .map_err(|e| state.reject(e))?;

    success(tenders.iter().map(TenderView::from).collect())
}

/// GET /api/tenders/{id}/status - Current status of a tender.
pub async fn get_tender_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<&'static str> {
    let username = required("username", query.username)?;

    let status = state
        .tenders
        .status(&id, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(status.presented())
}

/// PUT /api/tenders/{id}/status - Change the status of a tender.
pub async fn update_tender_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<StatusChangeQuery>,
) -> ApiResult<TenderView> {
    let raw = required("status", query.status)?;
    let status = TenderStatus::from_presented(&raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown tender status {}", raw)))?;
    let username = required("username", query.username)?;

    let tender = state
        .tenders
        .change_status(&id, status, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(TenderView::from(&tender))
}

/// PATCH /api/tenders/{id}/edit - Partially edit a tender.
pub async fn edit_tender(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<UserQuery>,
    ApiJson(request): ApiJson<EditTenderRequest>,
) -> ApiResult<TenderView> {
    let username = required("username", query.username)?;
    let patch = request.validate()?;

    let tender = state
        .tenders
        .edit(&id, patch, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(TenderView::from(&tender))
}

/// PUT /api/tenders/{id}/rollback/{version} - Re-publish an older version.
pub async fn rollback_tender(
    State(state): State<AppState>,
    Path((id, version)): Path<(String, String)>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<TenderView> {
    let version = version_param(&version, 1)?;
    let username = required("username", query.username)?;

    let tender = state
        .tenders
        .rollback(&id, version, &username)
        .await
        .map_err(|e| state.reject(e))?;

    success(TenderView::from(&tender))
}
