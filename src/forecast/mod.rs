//! Sales forecasting
//!
//! The adapter collapses purchases into a daily revenue series, hands it to a
//! [`Forecaster`] and keeps only the projected points after the last observed
//! day. The model itself sits behind the trait so it can be swapped or stubbed.

mod holt;

pub use holt::HoltForecaster;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::store::Purchase;

/// Fewer distinct days than this is not worth fitting
pub const MIN_OBSERVATIONS: usize = 3;

/// Total revenue observed on one calendar day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_amount: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data for forecast: need at least 3 distinct dates, got {0}")]
    InsufficientData(usize),
    #[error("forecast produced a non-finite value for {0}")]
    NonFinite(NaiveDate),
    #[error("forecast horizon overflows the calendar")]
    DateOverflow,
}

impl ForecastError {
    /// Data conditions the caller reports as information rather than failure
    pub fn is_informational(&self) -> bool {
        matches!(self, ForecastError::InsufficientData(_))
    }
}

/// Time-series model used to project daily revenue.
///
/// `series` is sorted by date with one point per day that had purchases;
/// days without purchases are absent. Implementations may
/// return in-sample points as well; the adapter discards anything dated on
/// or before the last observation.
pub trait Forecaster: Send + Sync {
    fn fit_and_predict(&self, series: &[SeriesPoint], horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError>;
}

pub type SharedForecaster = Arc<dyn Forecaster>;

/// Sum amounts per calendar day, ascending by date
pub fn daily_series(purchases: &[Purchase]) -> Vec<SeriesPoint> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for purchase in purchases {
        *by_day.entry(purchase.purchase_date).or_insert(0.0) += purchase.amount;
    }
    by_day
        .into_iter()
        .map(|(date, amount)| SeriesPoint { date, amount })
        .collect()
}

/// Project daily revenue up to `days` days past the last purchase
pub fn forecast(purchases: &[Purchase], days: usize, forecaster: &dyn Forecaster) -> Result<Vec<ForecastPoint>, ForecastError> {
    let series = daily_series(purchases);
    let last_observed = match series.last() {
        Some(point) if series.len() >= MIN_OBSERVATIONS => point.date,
        _ => return Err(ForecastError::InsufficientData(series.len())),
    };

    tracing::debug!(observations = series.len(), days, "fitting forecast");
    let mut points = forecaster.fit_and_predict(&series, days)?;

    points.retain(|p| p.date > last_observed);
    points.sort_by_key(|p| p.date);
    points.truncate(days);
    Ok(points)
}


#[cfg(test)]
mod tests {
    use super::testing::StubForecaster;
    use super::*;
    use crate::store::date;

    fn purchase(d: NaiveDate, amount: f64) -> Purchase {
        Purchase::new("Ana", "USA", d, amount)
    }

    #[test]
    fn same_day_purchases_merge_into_one_point() {
        let series = daily_series(&[
            purchase(date(2024, 1, 3), 5.0),
            purchase(date(2024, 1, 1), 10.0),
            purchase(date(2024, 1, 3), 7.5),
        ]);
        assert_eq!(
            series,
            vec![
                SeriesPoint { date: date(2024, 1, 1), amount: 10.0 },
                SeriesPoint { date: date(2024, 1, 3), amount: 12.5 },
            ]
        );
    }

    #[test]
    fn fewer_than_three_dates_never_reaches_the_model() {
        let stub = StubForecaster::default();
        let purchases = vec![
            purchase(date(2024, 1, 1), 1.0),
            purchase(date(2024, 1, 1), 2.0),
            purchase(date(2024, 1, 2), 3.0),
            purchase(date(2024, 1, 2), 4.0),
        ];
        assert_eq!(forecast(&purchases, 30, &stub), Err(ForecastError::InsufficientData(2)));
        assert_eq!(forecast(&[], 30, &stub), Err(ForecastError::InsufficientData(0)));
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn keeps_only_future_points_up_to_horizon() {
        let stub = StubForecaster::default();
        let purchases = vec![
            purchase(date(2024, 1, 1), 1.0),
            purchase(date(2024, 1, 5), 2.0),
            purchase(date(2024, 1, 9), 3.0),
        ];
        let points = forecast(&purchases, 4, &stub).unwrap();
        assert_eq!(stub.calls(), 1);
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 10), date(2024, 1, 11), date(2024, 1, 12), date(2024, 1, 13)]);
        assert!(points.iter().all(|p| p.lower_bound <= p.predicted_amount && p.predicted_amount <= p.upper_bound));
    }

    #[test]
    fn only_insufficient_data_is_informational() {
        assert!(ForecastError::InsufficientData(1).is_informational());
        assert!(!ForecastError::NonFinite(date(2024, 1, 1)).is_informational());
    }
}
