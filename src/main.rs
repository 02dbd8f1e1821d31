//! Tender Marketplace Backend
//!
//! A REST backend for versioned tenders and bids with SQLite persistence.

mod api;
mod config;
mod db;
mod errors;
mod gate;
mod guard;
mod models;
mod services;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::{BidStore, FeedbackStore, IdentityResolver, TenderStore};
use errors::AppError;
use gate::Availability;
use services::{BidService, TenderService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub tenders: Arc<TenderService>,
    pub bids: Arc<BidService>,
    pub availability: Arc<Availability>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        let identity = IdentityResolver::new(pool.clone());
        let tenders = TenderStore::new(pool.clone());

        Self {
            tenders: Arc::new(TenderService::new(tenders.clone(), identity.clone())),
            bids: Arc::new(BidService::new(
                BidStore::new(pool.clone()),
                tenders,
                FeedbackStore::new(pool),
                identity,
            )),
            availability: Arc::new(Availability::new()),
        }
    }

    /// Route a failed service call through the availability latch.
    pub fn reject(&self, err: AppError) -> AppError {
        self.availability.observe(err)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Starting Tender Marketplace Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path, config.db_max_connections).await?;

    // Create application state
    let state = AppState::new(pool.clone());

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .route("/ping", get(api::ping))
        // Tenders
        .route("/tenders", get(api::list_tenders))
        .route("/tenders/new", post(api::create_tender))
        .route("/tenders/my", get(api::my_tenders))
        .route(
            "/tenders/{id}/status",
            get(api::get_tender_status).put(api::update_tender_status),
        )
        .route("/tenders/{id}/edit", patch(api::edit_tender))
        .route("/tenders/{id}/rollback/{version}", put(api::rollback_tender))
        // Bids
        .route("/bids/new", post(api::create_bid))
        .route("/bids/my", get(api::my_bids))
        .route("/bids/{id}/list", get(api::tender_bids))
        .route(
            "/bids/{id}/status",
            get(api::get_bid_status).put(api::update_bid_status),
        )
        .route("/bids/{id}/edit", patch(api::edit_bid))
        .route("/bids/{id}/submit_decision", put(api::submit_decision))
        .route("/bids/{id}/feedback", put(api::add_feedback))
        .route("/bids/{id}/rollback/{version}", put(api::rollback_bid))
        .route("/bids/{id}/reviews", get(api::reviews))
        // Refuse everything once the store has been lost
        .layer(middleware::from_fn_with_state(
            state.availability.clone(),
            gate::availability_gate,
        ));

    // Health check (outside the gate)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Response {
    match state.availability.reason() {
        None => (StatusCode::OK, "OK").into_response(),
        Some(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests;
