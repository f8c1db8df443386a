//! KPI aggregation over a set of purchases

use chrono::{Datelike, Month};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::forecast::{self, ForecastError, ForecastPoint, Forecaster};
use crate::store::Purchase;

/// Which record set a KPI request is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum KpiOption {
    #[default]
    #[serde(rename = "All purchases")]
    All,
    #[serde(rename = "Filtered purchases")]
    Filtered,
}

/// Month with the highest revenue, serialized as `{"January": 300.0}`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopMonth {
    pub month: Month,
    pub total: f64,
}

impl Serialize for TopMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.month.name(), &self.total)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    /// Mean of per-customer totals
    pub mean_purchase_per_client: f64,
    pub total_revenue: f64,
    /// Transactions per country (not distinct customers)
    pub clients_per_country: BTreeMap<String, u64>,
    pub top_countries_by_revenue: BTreeMap<String, f64>,
    pub top_month: Option<TopMonth>,
}

#[derive(Debug, Serialize)]
pub struct KpiReport {
    #[serde(flatten)]
    pub summary: KpiSummary,
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Debug, Error, PartialEq)]
pub enum KpiError {
    #[error("no purchases available")]
    NoPurchases,
    #[error("no filtered purchases available")]
    NoFilteredPurchases,
    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

impl KpiError {
    /// Conditions reported to the caller as a 200 `{"error": ...}` payload
    pub fn is_informational(&self) -> bool {
        match self {
            KpiError::NoPurchases | KpiError::NoFilteredPurchases => true,
            KpiError::Forecast(e) => e.is_informational(),
        }
    }
}

/// Aggregate KPIs over `purchases`; `option` only picks the empty-set message
pub fn summarize(purchases: &[Purchase], option: KpiOption) -> Result<KpiSummary, KpiError> {
    if purchases.is_empty() {
        return Err(match option {
            KpiOption::All => KpiError::NoPurchases,
            KpiOption::Filtered => KpiError::NoFilteredPurchases,
        });
    }

    let mut customers: HashSet<&str> = HashSet::new();
    let mut clients_per_country: BTreeMap<String, u64> = BTreeMap::new();
    let mut revenue_per_country: BTreeMap<String, f64> = BTreeMap::new();
    let mut revenue_per_month = [0.0_f64; 12];
    let mut month_seen = [false; 12];
    let mut total_revenue = 0.0;

    for purchase in purchases {
        total_revenue += purchase.amount;
        customers.insert(purchase.customer_name.as_str());
        *clients_per_country.entry(purchase.country.clone()).or_insert(0) += 1;
        *revenue_per_country.entry(purchase.country.clone()).or_insert(0.0) += purchase.amount;

        let month = purchase.purchase_date.month0() as usize;
        revenue_per_month[month] += purchase.amount;
        month_seen[month] = true;
    }

    // Per-customer totals sum to total_revenue
    let mean_purchase_per_client = if customers.is_empty() {
        0.0
    } else {
        total_revenue / customers.len() as f64
    };

    Ok(KpiSummary {
        mean_purchase_per_client,
        total_revenue,
        clients_per_country,
        top_countries_by_revenue: revenue_per_country,
        top_month: top_month(&revenue_per_month, &month_seen),
    })
}

/// Highest-revenue month among those with purchases; ties go to the earliest month
fn top_month(revenue: &[f64; 12], seen: &[bool; 12]) -> Option<TopMonth> {
    let mut best: Option<(usize, f64)> = None;
    for index in (0..12).filter(|&i| seen[i]) {
        match best {
            Some((_, total)) if revenue[index] <= total => {}
            _ => best = Some((index, revenue[index])),
        }
    }
    best.and_then(|(index, total)| {
        let month = Month::try_from(index as u8 + 1).ok()?;
        Some(TopMonth { month, total })
    })
}

/// KPIs plus a `days`-day revenue forecast for the same purchases
pub fn report(purchases: &[Purchase], option: KpiOption, days: usize, forecaster: &dyn Forecaster) -> Result<KpiReport, KpiError> {
    let summary = summarize(purchases, option)?;
    let forecast = forecast::forecast(purchases, days, forecaster)?;
    Ok(KpiReport { summary, forecast })
}
