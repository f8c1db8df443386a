//! In-memory purchase store

mod csv_import;

pub use csv_import::{parse_csv, IngestError};

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// A single customer purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub customer_name: String,
    pub country: String,
    pub purchase_date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("customer_name must not be empty")]
    EmptyCustomerName,
    #[error("country must not be empty")]
    EmptyCountry,
    #[error("amount must be a finite number, got {0}")]
    NonFiniteAmount(f64),
}

impl Purchase {
    pub fn new(customer_name: impl Into<String>, country: impl Into<String>, purchase_date: NaiveDate, amount: f64) -> Self {
        Self {
            customer_name: customer_name.into(),
            country: country.into(),
            purchase_date,
            amount,
        }
    }

    /// Check the fields serde cannot enforce on its own.
    /// Negative and zero amounts are accepted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::EmptyCustomerName);
        }
        if self.country.trim().is_empty() {
            return Err(ValidationError::EmptyCountry);
        }
        if !self.amount.is_finite() {
            return Err(ValidationError::NonFiniteAmount(self.amount));
        }
        Ok(())
    }
}

/// Country and date-range predicate; all present parts must match
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseFilter {
    #[serde(default)]
    pub countries: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PurchaseFilter {
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() && self.start_date.is_none() && self.end_date.is_none()
    }

    /// Build a reusable predicate. Countries are lower-cased once here.
    pub fn matcher(&self) -> impl Fn(&Purchase) -> bool + '_ {
        let countries: Vec<String> = self.countries.iter().map(|c| c.to_lowercase()).collect();
        move |purchase: &Purchase| {
            if !countries.is_empty() && !countries.contains(&purchase.country.to_lowercase()) {
                return false;
            }
            if let Some(start) = self.start_date {
                if purchase.purchase_date < start {
                    return false;
                }
            }
            if let Some(end) = self.end_date {
                if purchase.purchase_date > end {
                    return false;
                }
            }
            true
        }
    }
}

/// Append-only purchase list shared across request handlers
#[derive(Clone, Default)]
pub struct PurchaseStore {
    purchases: Arc<RwLock<Vec<Purchase>>>,
}

impl PurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, purchase: Purchase) {
        self.purchases.write().push(purchase);
    }

    /// Append a whole batch under one write lock, so readers see all of it or none of it
    pub fn append_all(&self, batch: Vec<Purchase>) -> usize {
        let count = batch.len();
        self.purchases.write().extend(batch);
        count
    }

    /// Snapshot of every stored purchase in insertion order
    pub fn all(&self) -> Vec<Purchase> {
        self.purchases.read().clone()
    }

    /// Snapshot of the purchases matching `filter`, in insertion order
    pub fn query(&self, filter: &PurchaseFilter) -> Vec<Purchase> {
        if filter.is_empty() {
            return self.all();
        }
        let matches = filter.matcher();
        self.purchases
            .read()
            .iter()
            .filter(|p| matches(*p))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.purchases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.read().is_empty()
    }
}

#[cfg(test)]
pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> PurchaseStore {
        let store = PurchaseStore::new();
        store.append(Purchase::new("Ana", "USA", date(2023, 12, 31), 10.0));
        store.append(Purchase::new("Ben", "France", date(2024, 1, 1), 20.0));
        store.append(Purchase::new("Cy", "usa", date(2024, 6, 15), 30.0));
        store.append(Purchase::new("Dee", "Germany", date(2024, 12, 31), 40.0));
        store.append(Purchase::new("Eve", "France", date(2025, 1, 1), 50.0));
        store
    }

    #[test]
    fn all_returns_appends_in_order() {
        let store = PurchaseStore::new();
        let records: Vec<Purchase> = (0..5)
            .map(|i| Purchase::new(format!("c{}", i), "USA", date(2024, 1, 1 + i), i as f64))
            .collect();
        for record in &records {
            store.append(record.clone());
        }
        // duplicates are kept
        store.append(records[0].clone());

        let all = store.all();
        assert_eq!(all.len(), 6);
        assert_eq!(&all[..5], &records[..]);
        assert_eq!(all[5], records[0]);
    }

    #[test]
    fn append_all_reports_count() {
        let store = seeded();
        let added = store.append_all(vec![
            Purchase::new("Fay", "Spain", date(2024, 3, 3), 1.0),
            Purchase::new("Gus", "Spain", date(2024, 3, 4), 2.0),
        ]);
        assert_eq!(added, 2);
        assert_eq!(store.len(), 7);
        assert_eq!(store.all()[6].customer_name, "Gus");
    }

    #[test]
    fn empty_filter_returns_everything() {
        let store = seeded();
        assert_eq!(store.query(&PurchaseFilter::default()), store.all());
    }

    #[test]
    fn country_filter_is_case_insensitive() {
        let store = seeded();
        let filter = PurchaseFilter {
            countries: vec!["USA".to_string(), "GERMANY".to_string()],
            ..Default::default()
        };
        let names: Vec<String> = store.query(&filter).into_iter().map(|p| p.customer_name).collect();
        assert_eq!(names, vec!["Ana", "Cy", "Dee"]);
    }

    #[test]
    fn country_filter_does_not_trim_whitespace() {
        let store = seeded();
        let filter = PurchaseFilter {
            countries: vec![" usa".to_string()],
            ..Default::default()
        };
        assert!(store.query(&filter).is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let store = seeded();
        let filter = PurchaseFilter {
            start_date: Some(date(2024, 1, 1)),
            end_date: Some(date(2024, 12, 31)),
            ..Default::default()
        };
        let result = store.query(&filter);
        let names: Vec<&str> = result.iter().map(|p| p.customer_name.as_str()).collect();
        assert_eq!(names, vec!["Ben", "Cy", "Dee"]);
        assert!(result
            .iter()
            .all(|p| p.purchase_date >= date(2024, 1, 1) && p.purchase_date <= date(2024, 12, 31)));
    }

    #[test]
    fn filters_compose_with_and() {
        let store = seeded();
        let filter = PurchaseFilter {
            countries: vec!["france".to_string()],
            start_date: Some(date(2024, 6, 1)),
            end_date: None,
        };
        let result = store.query(&filter);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].customer_name, "Eve");
    }

    #[test]
    fn query_does_not_mutate_store() {
        let store = seeded();
        let before = store.all();
        let _ = store.query(&PurchaseFilter {
            countries: vec!["France".to_string()],
            ..Default::default()
        });
        assert_eq!(store.all(), before);
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let blank_name = Purchase::new("  ", "USA", date(2024, 1, 1), 1.0);
        assert_eq!(blank_name.validate(), Err(ValidationError::EmptyCustomerName));
        let blank_country = Purchase::new("Ana", "", date(2024, 1, 1), 1.0);
        assert_eq!(blank_country.validate(), Err(ValidationError::EmptyCountry));
    }

    #[test]
    fn validate_accepts_negative_and_zero_amounts() {
        assert!(Purchase::new("Ana", "USA", date(2024, 1, 1), -5.0).validate().is_ok());
        assert!(Purchase::new("Ana", "USA", date(2024, 1, 1), 0.0).validate().is_ok());
        assert!(Purchase::new("Ana", "USA", date(2024, 1, 1), f64::NAN).validate().is_err());
    }
}
