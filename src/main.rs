//! Salesboard - customer purchase analytics service
//!
//! Ingests purchase records (single JSON or bulk CSV) into memory and serves:
//! - Filtered purchase listings by country and date range
//! - Revenue KPIs per customer, country and month
//! - A daily revenue forecast with confidence bounds

mod config;
mod error;
mod events;
mod forecast;
mod kpi;
mod store;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &config::LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // LOG_FORMAT=gcp is honoured even when the config file says otherwise
    let gcp = config.format == "gcp" || std::env::var("LOG_FORMAT").map(|f| f == "gcp").unwrap_or(false);
    if gcp {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = config::Config::load()?;
    init_logging(&config.logging);

    info!("Starting Salesboard...");

    let forecaster = forecast::HoltForecaster::from_config(&config.forecast);
    info!(
        "Forecasting with Holt smoothing (alpha={}, beta={}, interval={})",
        config.forecast.smoothing_level, config.forecast.smoothing_trend, config.forecast.interval_width
    );

    let state = Arc::new(web::AppState {
        store: store::PurchaseStore::new(),
        event_bus: events::EventBus::with_capacity(events::CHANNEL_CAPACITY),
        forecaster: Arc::new(forecaster),
        forecast: config.forecast.clone(),
    });

    // Start web server (blocking)
    web::start_server(&config, state).await?;

    Ok(())
}
