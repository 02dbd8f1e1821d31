//! REST API module.
//!
//! Handlers only parse and validate request shape, call one service operation and
//! wrap the result. Service errors pass through `AppState::reject` so store
//! outages latch the availability gate.

mod bids;
mod tenders;

pub use bids::*;
pub use tenders::*;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::db::{Bid, Tender};
use crate::errors::AppError;
use crate::models::{Lifecycle, MAX_ID_LEN};

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Query string extractor that reports malformed input in the error envelope.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// JSON body extractor that reports malformed input in the error envelope.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// A mandatory, non-empty query parameter.
pub(crate) fn required(name: &str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(value) if !value.is_empty() && value.chars().count() <= MAX_ID_LEN => Ok(value),
        Some(value) if !value.is_empty() => Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            name, MAX_ID_LEN
        ))),
        _ => Err(AppError::Validation(format!("{} is required", name))),
    }
}

/// A path segment holding a version number no lower than `min`.
pub(crate) fn version_param(raw: &str, min: i64) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(version) if version >= min => Ok(version),
        _ => Err(AppError::Validation(format!(
            "version must be an integer of at least {}",
            min
        ))),
    }
}

/// A tender as returned to callers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: &'static str,
    pub service_type: &'static str,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&Tender> for TenderView {
    fn from(tender: &Tender) -> Self {
        Self {
            id: tender.id.clone(),
            name: tender.content.name.clone(),
            description: tender.content.description.clone(),
            status: tender.content.status.presented(),
            service_type: tender.content.service_type.as_str(),
            version: tender.version,
            created_at: tender.created_at,
        }
    }
}

/// A bid as returned to callers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidView {
    pub id: String,
    pub name: String,
    pub status: &'static str,
    pub author_type: &'static str,
    pub author_id: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&Bid> for BidView {
    fn from(bid: &Bid) -> Self {
        Self {
            id: bid.id.clone(),
            name: bid.content.name.clone(),
            status: bid.content.status.presented(),
            author_type: bid.head.author.author_type(),
            author_id: bid.head.author.author_id().to_string(),
            version: bid.version,
            created_at: bid.created_at,
        }
    }
}
