//! EU VAT rates scraped from the Your Europe rates table
//!
//! The published table has one combined `Reduced rate` column such as
//! `5 / 12`. It is split into `Reduced rate 1` (the higher rate) and
//! `Reduced rate 2`; a missing or repeated second rate is reported as `-`.

use crate::error::{IntrastatError, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::cmp::Ordering;
use std::io::Write;

pub const VAT_RATES_URL: &str =
    "https://europa.eu/youreurope/business/taxation/vat/vat-rules-rates/";

const NO_RATE: &str = "-";

/// One member state row of the rates table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VatRate {
    #[serde(rename = "Member State")]
    pub member_state: String,
    #[serde(rename = "Country code")]
    pub country_code: String,
    #[serde(rename = "Standard rate")]
    pub standard_rate: String,
    #[serde(rename = "Reduced rate 1")]
    pub reduced_rate_1: String,
    #[serde(rename = "Reduced rate 2")]
    pub reduced_rate_2: String,
    #[serde(rename = "Super reduced rate")]
    pub super_reduced_rate: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| IntrastatError::ParseError(format!("Invalid selector '{}': {:?}", css, e)))
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn rate_value(rate: &str) -> Option<f64> {
    rate.trim_end_matches('%')
        .trim()
        .replace(',', ".")
        .parse()
        .ok()
}

/// Split a combined reduced rate cell into `(higher, lower)`
pub fn split_reduced_rates(raw: &str) -> (String, String) {
    let mut rates: Vec<&str> = raw
        .split('/')
        .map(str::trim)
        .filter(|r| !r.is_empty() && *r != NO_RATE)
        .collect();

    rates.sort_by(|a, b| match (rate_value(a), rate_value(b)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let first = rates.first().copied().unwrap_or(NO_RATE);
    let second = rates
        .get(1)
        .copied()
        .filter(|r| *r != first)
        .unwrap_or(NO_RATE);
    (first.to_string(), second.to_string())
}

/// Parse the first table of the rates page
pub fn parse_vat_rates(html: &str) -> Result<Vec<VatRate>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| IntrastatError::SchemaError("VAT rates page has no table".to_string()))?;

    let rows: Vec<Vec<String>> = table
        .select(&row_selector)
        .map(|row| row.select(&cell_selector).map(cell_text).collect())
        .collect();

    let header_idx = rows
        .iter()
        .position(|row| row.iter().any(|c| normalize_header(c) == "country code"))
        .ok_or_else(|| {
            IntrastatError::SchemaError("VAT rates table has no 'Country code' header".to_string())
        })?;
    let header = &rows[header_idx];

    let column = |prefix: &str| {
        header
            .iter()
            .position(|h| normalize_header(h).starts_with(prefix))
            .ok_or_else(|| {
                IntrastatError::SchemaError(format!("VAT rates table has no '{}' column", prefix))
            })
    };
    let member = column("member state")?;
    let code = column("country code")?;
    let standard = column("standard")?;
    let reduced = column("reduced")?;
    let super_reduced = column("super reduced")?;

    let rates = rows[header_idx + 1..]
        .iter()
        .filter(|row| row.get(member).map_or(false, |m| !m.is_empty()))
        .map(|row| {
            let cell = |i: usize| row.get(i).cloned().unwrap_or_else(|| NO_RATE.to_string());
            let (reduced_rate_1, reduced_rate_2) = split_reduced_rates(&cell(reduced));
            VatRate {
                member_state: cell(member),
                country_code: cell(code),
                standard_rate: cell(standard),
                reduced_rate_1,
                reduced_rate_2,
                super_reduced_rate: cell(super_reduced),
            }
        })
        .collect::<Vec<_>>();

    log::debug!("Parsed VAT rates for {} member states", rates.len());
    Ok(rates)
}

fn word_chars(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// Filter by alpha-2 country code (two characters) or member state name.
/// An empty query keeps every row.
pub fn filter_vat_rates(rates: Vec<VatRate>, query: &str) -> Vec<VatRate> {
    let query = word_chars(query);
    match query.chars().count() {
        0 | 1 => rates,
        2 => rates
            .into_iter()
            .filter(|r| word_chars(&r.country_code) == query)
            .collect(),
        _ => rates
            .into_iter()
            .filter(|r| word_chars(&r.member_state) == query)
            .collect(),
    }
}

pub fn write_vat_rates_csv<W: Write>(rates: &[VatRate], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for rate in rates {
        writer.serialize(rate)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "async")]
pub async fn fetch_vat_rates(
    settings: &crate::config::HttpSettings,
    url: &str,
) -> Result<Vec<VatRate>> {
    let client = crate::http::build_client(settings)?;
    let (status, body) = crate::http::get_text(&client, url).await?;
    if status != 200 {
        return Err(IntrastatError::HttpError(format!(
            "VAT rates page returned status {}",
            status
        )));
    }
    parse_vat_rates(&body)
}
