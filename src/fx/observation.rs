//! Rate observations - the typed input of the dense table builder

use crate::error::{IntrastatError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Name of the date index column in every exported rate table.
/// No currency may use it.
pub const DATE_COLUMN: &str = "Date";

/// Date format used by the ECB feed and all CSV exports
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single (date, currency, rate) quote against the feed's base currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawObservation")]
pub struct RateObservation {
    date: NaiveDate,
    currency: String,
    rate: f64,
}

#[derive(Deserialize)]
struct RawObservation {
    date: NaiveDate,
    currency: String,
    rate: f64,
}

impl TryFrom<RawObservation> for RateObservation {
    type Error = IntrastatError;

    fn try_from(raw: RawObservation) -> Result<Self> {
        Self::new(raw.date, raw.currency, raw.rate)
    }
}

impl RateObservation {
    /// Create a validated observation
    pub fn new(date: NaiveDate, currency: impl Into<String>, rate: f64) -> Result<Self> {
        let currency = currency.into().trim().to_string();
        validate_currency(&currency)?;

        if !rate.is_finite() {
            return Err(IntrastatError::SchemaError(format!(
                "Rate for {} on {} is not a finite number: {}",
                currency, date, rate
            )));
        }

        Ok(Self {
            date,
            currency,
            rate,
        })
    }

    /// Parse an observation from the raw string fields of a feed record
    pub fn parse(date: &str, currency: &str, rate: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
            IntrastatError::SchemaError(format!("Invalid observation date '{}': {}", date, e))
        })?;
        let rate: f64 = rate.trim().parse().map_err(|_| {
            IntrastatError::SchemaError(format!(
                "Rate '{}' for {} on {} is not numeric",
                rate, currency, date
            ))
        })?;
        Self::new(date, currency, rate)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// Reject currency names that cannot become a table column
pub(crate) fn validate_currency(currency: &str) -> Result<()> {
    if currency.is_empty() {
        return Err(IntrastatError::SchemaError(
            "Observation has an empty currency code".to_string(),
        ));
    }
    if currency.eq_ignore_ascii_case(DATE_COLUMN) {
        return Err(IntrastatError::SchemaError(format!(
            "Currency '{}' collides with the reserved '{}' column",
            currency, DATE_COLUMN
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ObservationRow {
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Currency")]
    currency: Option<String>,
    #[serde(rename = "Rate")]
    rate: Option<String>,
}

/// Read `Date,Currency,Rate` records from CSV
pub fn read_observations_csv<R: Read>(reader: R) -> Result<Vec<RateObservation>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    for required in [DATE_COLUMN, "Currency", "Rate"] {
        if !headers.iter().any(|h| h == required) {
            return Err(IntrastatError::SchemaError(format!(
                "Observation CSV is missing the '{}' column",
                required
            )));
        }
    }

    let mut observations = Vec::new();
    for (line, record) in reader.deserialize::<ObservationRow>().enumerate() {
        let row = record?;
        let field = |value: Option<String>, name: &str| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                IntrastatError::SchemaError(format!("Record {} has no '{}' value", line + 1, name))
            })
        };
        let date = field(row.date, DATE_COLUMN)?;
        let currency = field(row.currency, "Currency")?;
        let rate = field(row.rate, "Rate")?;
        observations.push(RateObservation::parse(&date, &currency, &rate)?);
    }

    Ok(observations)
}
