//! Holt's linear exponential smoothing

use chrono::{Days, NaiveDate};

use super::{ForecastError, ForecastPoint, Forecaster, SeriesPoint};
use crate::config::ForecastConfig;

/// Level + trend smoothing with a residual-based confidence band.
///
/// The series is fitted one calendar day per step: days without purchases
/// count as zero revenue, so the trend is per day like the projections.
#[derive(Debug, Clone)]
pub struct HoltForecaster {
    alpha: f64,
    beta: f64,
    /// Two-sided normal quantile for the configured interval width
    z: f64,
}

impl HoltForecaster {
    pub fn new(alpha: f64, beta: f64, interval_width: f64) -> Self {
        Self {
            alpha,
            beta,
            z: normal_quantile(0.5 + interval_width / 2.0),
        }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Self::new(config.smoothing_level, config.smoothing_trend, config.interval_width)
    }
}

impl Forecaster for HoltForecaster {
    fn fit_and_predict(&self, series: &[SeriesPoint], horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError> {
        let dense = densify(series);
        let (first, second, last) = match dense.as_slice() {
            [first, second, .., last] => (first, second, last),
            _ => return Err(ForecastError::InsufficientData(series.len())),
        };

        let mut level = first.amount;
        let mut trend = second.amount - first.amount;
        let mut points = Vec::with_capacity(dense.len() + horizon);
        points.push(ForecastPoint {
            date: first.date,
            predicted_amount: first.amount,
            lower_bound: first.amount,
            upper_bound: first.amount,
        });

        let mut fitted = Vec::with_capacity(dense.len() - 1);
        let mut squared_error = 0.0;
        for observation in &dense[1..] {
            let estimate = level + trend;
            squared_error += (observation.amount - estimate).powi(2);
            fitted.push((observation.date, estimate));

            let previous_level = level;
            level = self.alpha * observation.amount + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - previous_level) + (1.0 - self.beta) * trend;
        }
        let sigma = (squared_error / fitted.len() as f64).sqrt();

        let one_step = self.z * sigma;
        for (date, estimate) in fitted {
            points.push(ForecastPoint {
                date,
                predicted_amount: estimate,
                lower_bound: estimate - one_step,
                upper_bound: estimate + one_step,
            });
        }

        for step in 1..=horizon {
            let date = last
                .date
                .checked_add_days(Days::new(step as u64))
                .ok_or(ForecastError::DateOverflow)?;
            let estimate = level + step as f64 * trend;
            let half_width = self.z * sigma * (step as f64).sqrt();
            points.push(ForecastPoint {
                date,
                predicted_amount: estimate,
                lower_bound: estimate - half_width,
                upper_bound: estimate + half_width,
            });
        }

        if let Some(bad) = points
            .iter()
            .find(|p| !(p.predicted_amount.is_finite() && p.lower_bound.is_finite() && p.upper_bound.is_finite()))
        {
            return Err(ForecastError::NonFinite(bad.date));
        }

        Ok(points)
    }
}

/// Longest history fitted, in days; older observations are dropped
const MAX_FIT_DAYS: u64 = 3_660;

/// One point per calendar day from the first observation (or the start of
/// the fit window) to the last, with zero on days nothing was sold
fn densify(series: &[SeriesPoint]) -> Vec<SeriesPoint> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Vec::new();
    };
    let window_start = last
        .date
        .checked_sub_days(Days::new(MAX_FIT_DAYS - 1))
        .unwrap_or(NaiveDate::MIN);
    let start = first.date.max(window_start);

    let mut observed = series.iter().skip_while(|p| p.date < start).peekable();
    start
        .iter_days()
        .take_while(|day| *day <= last.date)
        .map(|date| {
            let mut amount = 0.0;
            while let Some(point) = observed.next_if(|p| p.date == date) {
                amount += point.amount;
            }
            SeriesPoint { date, amount }
        })
        .collect()
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9). `p` must lie in (0, 1).
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838,
        -2.549732539343734,
        4.374664141464968,
        2.938163982698783,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996,
        3.754408661907416,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
