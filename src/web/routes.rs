//! HTTP routes

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    response::Html,
    Json,
};
use axum_extra::extract::{Query, QueryRejection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::error::ApiError;
use crate::kpi::{self, KpiOption, KpiReport};
use crate::store::{parse_csv, Purchase, PurchaseFilter};

/// Serve the dashboard page
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Store one purchase and echo it back
pub async fn add_purchase(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Purchase>, JsonRejection>,
) -> Result<Json<Purchase>, ApiError> {
    let Json(purchase) = payload?;
    purchase.validate()?;

    state.store.append(purchase.clone());
    state.event_bus.publish(purchase.clone());
    tracing::debug!("Stored purchase for {} ({})", purchase.customer_name, purchase.country);

    Ok(Json(purchase))
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub added: usize,
}

fn is_csv(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("text/csv"))
        .unwrap_or(false)
}

/// Import a CSV upload; nothing is stored unless every row parses
pub async fn add_bulk_purchases(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BulkResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        if !is_csv(field.content_type()) {
            return Err(ApiError::BadRequest("Invalid file format".to_string()));
        }

        let payload = field.bytes().await?;
        let purchases = parse_csv(&payload)?;

        let added = state.store.append_all(purchases.clone());
        for purchase in purchases {
            state.event_bus.publish(purchase);
        }
        tracing::info!("Bulk import added {} purchases ({} stored)", added, state.store.len());

        return Ok(Json(BulkResponse { added }));
    }

    Err(ApiError::BadRequest("missing 'file' field".to_string()))
}

/// List purchases matching the optional country and date filters
pub async fn get_purchases(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<PurchaseFilter>, QueryRejection>,
) -> Result<Json<Vec<Purchase>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.store.query(&filter)))
}

#[derive(Debug, Deserialize)]
pub struct KpiQuery {
    #[serde(default)]
    pub kpi_option: KpiOption,
    pub days: Option<u32>,
    #[serde(default)]
    pub countries: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl KpiQuery {
    fn filter(self) -> PurchaseFilter {
        PurchaseFilter {
            countries: self.countries,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// KPIs and revenue forecast over all purchases, or over the purchases
/// matching the filter parameters passed with this same request
pub async fn calculate_kpis(
    State(state): State<Arc<AppState>>,
    query: Result<Query<KpiQuery>, QueryRejection>,
) -> Result<Json<KpiReport>, ApiError> {
    let Query(query) = query?;

    let days = query.days.unwrap_or(state.forecast.default_days);
    if days == 0 || days > state.forecast.max_days {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}",
            state.forecast.max_days
        )));
    }

    let option = query.kpi_option;
    let purchases = match option {
        KpiOption::All => state.store.all(),
        KpiOption::Filtered => state.store.query(&query.filter()),
    };

    let forecaster = state.forecaster.clone();
    let report = tokio::task::spawn_blocking(move || {
        kpi::report(&purchases, option, days as usize, forecaster.as_ref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("KPI task failed: {}", e)))??;

    Ok(Json(report))
}
