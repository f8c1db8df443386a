//! Web server module

mod middleware;
mod routes;
mod sse;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::{Config, ForecastConfig};
use crate::events::EventBus;
use crate::forecast::SharedForecaster;
use crate::store::PurchaseStore;

pub struct AppState {
    pub store: PurchaseStore,
    pub event_bus: EventBus,
    pub forecaster: SharedForecaster,
    pub forecast: ForecastConfig,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        // Dashboard
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        // Live feed of stored purchases
        .route("/events", get(sse::events_handler))
        // Ingestion
        .route("/purchase/", post(routes::add_purchase))
        .route(
            "/purchase/bulk/",
            post(routes::add_bulk_purchases).layer(DefaultBodyLimit::max(config.ingest.max_upload_bytes)),
        )
        // Queries
        .route("/purchases/", get(routes::get_purchases))
        .route("/purchases/kpis", get(routes::calculate_kpis))
        .route("/purchases/kpis/", get(routes::calculate_kpis))
        .layer(middleware::RequestLoggingLayer)
        .layer(cors_layer(&config.server.cors_origins))
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state, config);

    let addr = config.bind_addr();
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
