//! Process-wide availability latch.
//!
//! The first request that finds the store unreachable records why. From then on
//! every API request is refused with 503 until the process restarts; there is no
//! automatic recovery.

use std::sync::{Arc, OnceLock};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;

#[derive(Debug, Default)]
pub struct Availability {
    reason: OnceLock<String>,
}

impl Availability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.reason.get().is_none()
    }

    /// Reason recorded by the first failure, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Latch the service as unavailable. Only the first reason is kept.
    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.reason.set(reason.clone()).is_ok() {
            tracing::error!("Service marked unavailable: {}", reason);
        }
    }

    /// Latch on store failures and hand the error back unchanged.
    pub fn observe(&self, err: AppError) -> AppError {
        if let AppError::StoreUnavailable(reason) = &err {
            self.mark_unavailable(reason.clone());
        }
        err
    }
}

/// Refuse requests once the latch is set.
pub async fn availability_gate(
    State(availability): State<Arc<Availability>>,
    request: Request,
    next: Next,
) -> Response {
    match availability.reason() {
        None => next.run(request).await,
        Some(reason) => {
            tracing::debug!("Refusing {} while unavailable", request.uri().path());
            AppError::StoreUnavailable(reason.to_string()).into_response()
        }
    }
}
