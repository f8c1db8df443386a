//! CSV bulk import
//!
//! The whole payload is parsed and validated before anything touches the
//! store, so a bad row rejects the batch without a partial commit.

use chrono::NaiveDate;
use csv::{Position, ReaderBuilder, StringRecord};
use thiserror::Error;

use super::{Purchase, ValidationError};

const COLUMNS: [&str; 4] = ["customer_name", "country", "purchase_date", "amount"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("Error processing line {line}: {contents} - {source}")]
    Row {
        /// 1-based physical line where the record starts, header included
        line: u64,
        contents: String,
        #[source]
        source: RowError,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Column positions resolved from the header row
struct Layout {
    positions: [usize; 4],
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self, IngestError> {
        let mut positions = [0; 4];
        for (slot, column) in positions.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or(IngestError::MissingColumn(column))?;
        }
        Ok(Self { positions })
    }

    fn field<'r>(&self, record: &'r StringRecord, index: usize) -> Result<&'r str, RowError> {
        record
            .get(self.positions[index])
            .ok_or(RowError::MissingField(COLUMNS[index]))
    }

    fn purchase(&self, record: &StringRecord) -> Result<Purchase, RowError> {
        let customer_name = self.field(record, 0)?;
        let country = self.field(record, 1)?;

        let raw_date = self.field(record, 2)?;
        let purchase_date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d").map_err(|source| {
            RowError::InvalidDate {
                value: raw_date.to_string(),
                source,
            }
        })?;

        let raw_amount = self.field(record, 3)?;
        let amount: f64 = raw_amount
            .trim()
            .parse()
            .map_err(|_| RowError::InvalidAmount(raw_amount.to_string()))?;

        let purchase = Purchase::new(customer_name, country, purchase_date, amount);
        purchase.validate()?;
        Ok(purchase)
    }
}

/// Physical line a record starts on. The reader reports where the previous
/// record ended, so blank lines it skipped are counted here.
fn record_line(payload: &[u8], position: &Position) -> u64 {
    let skipped = payload
        .get(position.byte() as usize..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b == b'\r' || b == b'\n')
        .filter(|&&b| b == b'\n')
        .count();
    position.line() + skipped as u64
}

/// Parse a `customer_name,country,purchase_date,amount` CSV payload.
///
/// Extra columns are ignored. Returns every record, or the first failing row.
pub fn parse_csv(payload: &[u8]) -> Result<Vec<Purchase>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload);

    let layout = Layout::from_headers(reader.headers()?)?;

    let mut purchases = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| record_line(payload, position))
            .unwrap_or(index as u64 + 2);
        let purchase = layout.purchase(&record).map_err(|source| IngestError::Row {
            line,
            contents: record.iter().collect::<Vec<_>>().join(","),
            source,
        })?;
        purchases.push(purchase);
    }

    Ok(purchases)
}
