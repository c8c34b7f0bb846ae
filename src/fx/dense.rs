//! Calendar-dense FX rate table
//!
//! Turns a sparse list of quotes into one row per calendar day between the
//! first and last observed date, one column per currency. Days without a
//! quote (weekends, TARGET holidays) carry the most recent earlier quote
//! forward. Rows are held most-recent-first.
//!
//! Duplicate `(date, currency)` quotes resolve to the one appearing last in
//! the input slice.

use super::observation::{validate_currency, RateObservation, DATE_COLUMN, DATE_FORMAT};
use crate::error::{IntrastatError, Result};
use chrono::{Duration, NaiveDate};
use std::io::Write;

/// One calendar day of rates, values aligned with [`RateTable::currencies`]
#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    date: NaiveDate,
    values: Vec<Option<f64>>,
}

impl RateRow {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Cell values in column order; `None` is an unset cell
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
}

/// Dense daily rate table, dates contiguous and descending
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    currencies: Vec<String>,
    rows: Vec<RateRow>,
}

/// Pivot, reindex to the full calendar, forward-fill and sort descending.
///
/// # Errors
/// - [`IntrastatError::MissingDataError`] if `observations` is empty
/// - [`IntrastatError::SchemaError`] if a currency collides with the date column
pub fn build_dense_table(observations: &[RateObservation]) -> Result<RateTable> {
    let first = observations.first().ok_or_else(|| {
        IntrastatError::MissingDataError("No rate observations to pivot".to_string())
    })?;

    let mut currencies: Vec<String> = observations
        .iter()
        .map(|obs| obs.currency().to_string())
        .collect();
    currencies.sort();
    currencies.dedup();
    for currency in &currencies {
        validate_currency(currency)?;
    }

    let (min_date, max_date) = observations
        .iter()
        .fold((first.date(), first.date()), |(lo, hi), obs| {
            (lo.min(obs.date()), hi.max(obs.date()))
        });
    let days = (max_date - min_date).num_days() as usize + 1;

    // Pivot onto an ascending calendar grid. Later observations overwrite
    // earlier ones for the same cell.
    let mut grid = vec![vec![None; currencies.len()]; days];
    for obs in observations {
        let day = (obs.date() - min_date).num_days() as usize;
        if let Ok(col) = currencies.binary_search_by(|c| c.as_str().cmp(obs.currency())) {
            grid[day][col] = Some(obs.rate());
        }
    }

    let mut last_seen: Vec<Option<f64>> = vec![None; currencies.len()];
    for row in grid.iter_mut() {
        for (cell, last) in row.iter_mut().zip(last_seen.iter_mut()) {
            match cell {
                Some(value) => *last = Some(*value),
                None => *cell = *last,
            }
        }
    }

    let rows = grid
        .into_iter()
        .enumerate()
        .rev()
        .map(|(day, values)| RateRow {
            date: min_date + Duration::days(day as i64),
            values,
        })
        .collect();

    log::debug!(
        "Built dense rate table: {} observations -> {} days x {} currencies ({} to {})",
        observations.len(),
        days,
        currencies.len(),
        min_date,
        max_date
    );

    Ok(RateTable { currencies, rows })
}

impl RateTable {
    /// Currency columns in alphabetical order
    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    /// Rows, most recent date first
    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    /// Dates, most recent first
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|row| row.date)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn min_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|row| row.date)
    }

    fn column_index(&self, currency: &str) -> Option<usize> {
        self.currencies
            .binary_search_by(|c| c.as_str().cmp(currency))
            .ok()
    }

    fn row_index(&self, date: NaiveDate) -> Option<usize> {
        let max_date = self.max_date()?;
        let idx = (max_date - date).num_days();
        if idx < 0 || idx as usize >= self.rows.len() {
            return None;
        }
        Some(idx as usize)
    }

    /// Rate for a date and currency, `None` outside the span or for unset cells
    pub fn get(&self, date: NaiveDate, currency: &str) -> Option<f64> {
        let col = self.column_index(currency)?;
        let row = self.row_index(date)?;
        self.rows[row].values[col]
    }

    /// Rate for a date and currency, failing when the table has no value
    pub fn rate_on(&self, date: NaiveDate, currency: &str) -> Result<f64> {
        if self.column_index(currency).is_none() {
            return Err(IntrastatError::SchemaError(format!(
                "Rate table has no '{}' column",
                currency
            )));
        }
        self.get(date, currency).ok_or_else(|| {
            IntrastatError::MissingDataError(format!("No {} rate available for {}", currency, date))
        })
    }

    /// Rows with `start <= date <= end`
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> RateTable {
        RateTable {
            currencies: self.currencies.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row.date >= start && row.date <= end)
                .cloned()
                .collect(),
        }
    }

    /// Keep only the given currency columns
    pub fn select(&self, currencies: &[&str]) -> Result<RateTable> {
        let mut wanted: Vec<String> = currencies.iter().map(|c| c.trim().to_string()).collect();
        wanted.sort();
        wanted.dedup();

        let indices = wanted
            .iter()
            .map(|currency| {
                self.column_index(currency).ok_or_else(|| {
                    IntrastatError::SchemaError(format!(
                        "Rate table has no '{}' column",
                        currency
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| RateRow {
                date: row.date,
                values: indices.iter().map(|&i| row.values[i]).collect(),
            })
            .collect();

        Ok(RateTable {
            currencies: wanted,
            rows,
        })
    }

    /// Write the table as CSV with a leading `Date` column, most recent first
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.currencies.len() + 1);
        header.push(DATE_COLUMN.to_string());
        header.extend(self.currencies.iter().cloned());
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 1);
            record.push(row.date.format(DATE_FORMAT).to_string());
            record.extend(
                row.values
                    .iter()
                    .map(|value| value.map(format_rate).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| IntrastatError::ParseError(format!("CSV output is not UTF-8: {}", e)))
    }
}

/// Decimal string for a rate, always with a fractional part
pub fn format_rate(rate: f64) -> String {
    let text = rate.to_string();
    if text.contains('.') || !rate.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(date: &str, currency: &str, rate: &str) -> RateObservation {
        RateObservation::parse(date, currency, rate).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_empty_input_is_missing_data() {
        let err = build_dense_table(&[]).unwrap_err();
        assert!(matches!(err, IntrastatError::MissingDataError(_)));
    }

    #[test]
    fn test_weekend_gap_filled() {
        let table = build_dense_table(&[
            obs("2022-12-30", "EUR", "1.00"),
            obs("2023-01-06", "EUR", "1.00"),
        ])
        .unwrap();

        assert_eq!(table.len(), 8);
        assert_eq!(table.max_date(), Some(d(2023, 1, 6)));
        assert_eq!(table.min_date(), Some(d(2022, 12, 30)));
        assert!(table.rows().iter().all(|r| r.values() == [Some(1.0)]));
    }

    #[test]
    fn test_forward_fill_not_interpolated() {
        let table = build_dense_table(&[
            obs("2023-01-01", "SEK", "11.00"),
            obs("2023-01-01", "USD", "1.07"),
            obs("2023-01-02", "USD", "1.08"),
            obs("2023-01-03", "SEK", "12.00"),
            obs("2023-01-03", "USD", "1.09"),
        ])
        .unwrap();

        assert_eq!(table.get(d(2023, 1, 2), "SEK"), Some(11.0));
        assert_eq!(table.get(d(2023, 1, 2), "USD"), Some(1.08));
        assert_eq!(table.get(d(2023, 1, 3), "SEK"), Some(12.0));
    }

    #[test]
    fn test_leading_cells_stay_unset() {
        let table = build_dense_table(&[
            obs("2023-01-01", "USD", "1.07"),
            obs("2023-01-03", "SEK", "11.00"),
        ])
        .unwrap();

        assert_eq!(table.get(d(2023, 1, 1), "SEK"), None);
        assert_eq!(table.get(d(2023, 1, 2), "SEK"), None);
        assert_eq!(table.get(d(2023, 1, 3), "SEK"), Some(11.0));
        assert!(matches!(
            table.rate_on(d(2023, 1, 1), "SEK"),
            Err(IntrastatError::MissingDataError(_))
        ));
    }

    #[test]
    fn test_duplicate_quote_last_wins() {
        let table = build_dense_table(&[
            obs("2023-01-02", "USD", "1.01"),
            obs("2023-01-02", "USD", "1.02"),
        ])
        .unwrap();
        assert_eq!(table.get(d(2023, 1, 2), "USD"), Some(1.02));
    }

    #[test]
    fn test_unordered_input() {
        let table = build_dense_table(&[
            obs("2023-01-05", "USD", "1.05"),
            obs("2023-01-02", "USD", "1.02"),
        ])
        .unwrap();
        let dates: Vec<_> = table.dates().collect();
        assert_eq!(
            dates,
            vec![d(2023, 1, 5), d(2023, 1, 4), d(2023, 1, 3), d(2023, 1, 2)]
        );
        assert_eq!(table.get(d(2023, 1, 4), "USD"), Some(1.02));
    }

    #[test]
    fn test_between_and_select() {
        let table = build_dense_table(&[
            obs("2023-01-02", "USD", "1.02"),
            obs("2023-01-02", "SEK", "11.10"),
            obs("2023-01-09", "USD", "1.09"),
        ])
        .unwrap();

        let window = table.between(d(2023, 1, 3), d(2023, 1, 5));
        assert_eq!(window.len(), 3);
        assert_eq!(window.max_date(), Some(d(2023, 1, 5)));
        assert_eq!(window.get(d(2023, 1, 4), "SEK"), Some(11.1));

        let sek = table.select(&["SEK"]).unwrap();
        assert_eq!(sek.currencies(), ["SEK".to_string()]);
        assert_eq!(sek.len(), table.len());
        assert!(matches!(
            table.select(&["GBP"]),
            Err(IntrastatError::SchemaError(_))
        ));
    }

    #[test]
    fn test_outside_span_is_none() {
        let table = build_dense_table(&[obs("2023-01-02", "USD", "1.02")]).unwrap();
        assert_eq!(table.get(d(2023, 1, 1), "USD"), None);
        assert_eq!(table.get(d(2023, 1, 3), "USD"), None);
        assert_eq!(table.get(d(2023, 1, 2), "GBP"), None);
    }

    #[test]
    fn test_csv_export() {
        let table = build_dense_table(&[
            obs("2023-01-01", "USD", "1.07"),
            obs("2023-01-02", "SEK", "11"),
        ])
        .unwrap();
        let csv = table.to_csv_string().unwrap();
        assert_eq!(
            csv,
            "Date,SEK,USD\n2023-01-02,11.0,1.07\n2023-01-01,,1.07\n"
        );
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(1.0), "1.0");
        assert_eq!(format_rate(11.1218), "11.1218");
    }
}
