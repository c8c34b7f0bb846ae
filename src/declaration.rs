//! Intrastat declaration builder
//!
//! Turns raw shipment records into declaration lines: commodity codes in
//! query form, mass in kilograms, country of origin and transport coded,
//! B2C partners replaced with the placeholder VAT number, and the EUR net
//! amount converted with the reference rate of the shipping date.

use crate::commodity::{normalize_query_code, unique_query_codes, CodeStatus, CommodityCodeTable};
use crate::config::DeclarationSettings;
use crate::country::CountryLookup;
use crate::error::{IntrastatError, Result};
use crate::fx::RateTable;
use crate::transport::ModeOfTransport;
use chrono::NaiveDate;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// One row of the company's shipment export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    #[serde(rename = "Commodity Code")]
    pub commodity_code: String,
    #[serde(rename = "Ship To")]
    pub ship_to: String,
    #[serde(rename = "Country of Origin")]
    pub country_of_origin: String,
    #[serde(rename = "Mode of Transport")]
    pub mode_of_transport: String,
    #[serde(rename = "Incoterms")]
    pub incoterms: String,
    #[serde(rename = "Net (EUR)")]
    pub net_eur: f64,
    #[serde(rename = "Mass (grams)")]
    pub mass_grams: f64,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "Partner VAT", default)]
    pub partner_vat: String,
    #[serde(rename = "Transaction")]
    pub transaction: String,
    #[serde(rename = "Shipping Date")]
    pub shipping_date: NaiveDate,
}

impl Shipment {
    pub fn is_b2c(&self) -> bool {
        self.transaction.trim().eq_ignore_ascii_case("B2C")
    }
}

/// One row of the declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclarationLine {
    #[serde(rename = "CN8")]
    pub cn8: String,
    #[serde(rename = "Ship To")]
    pub ship_to: String,
    #[serde(rename = "COO")]
    pub coo: Option<String>,
    #[serde(rename = "MOT")]
    pub mot: Option<u8>,
    #[serde(rename = "Incoterms")]
    pub incoterms: String,
    #[serde(rename = "NET")]
    pub net: Option<f64>,
    #[serde(rename = "MASS")]
    pub mass: f64,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "Partner VAT")]
    pub partner_vat: String,
    #[serde(skip)]
    pub shipping_date: NaiveDate,
}

pub fn read_shipments_csv<R: Read>(reader: R) -> Result<Vec<Shipment>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    reader
        .deserialize::<Shipment>()
        .enumerate()
        .map(|(i, record)| {
            record.map_err(|e| {
                IntrastatError::SchemaError(format!("Shipment record {}: {}", i + 1, e))
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build declaration lines for a batch of shipments.
///
/// Unknown countries, transport modes and dates outside the rate table
/// leave the matching cell unset instead of failing the batch.
pub fn build_declaration(
    shipments: &[Shipment],
    countries: &CountryLookup,
    rates: &RateTable,
    settings: &DeclarationSettings,
) -> Result<Vec<DeclarationLine>> {
    if shipments.is_empty() {
        return Err(IntrastatError::MissingDataError(
            "No shipments to declare".to_string(),
        ));
    }
    if !rates.currencies().iter().any(|c| c == &settings.currency) {
        return Err(IntrastatError::SchemaError(format!(
            "Rate table has no '{}' column",
            settings.currency
        )));
    }

    let lines = shipments
        .iter()
        .map(|shipment| {
            let coo = countries.country_to_iso2(&shipment.country_of_origin);
            if coo.is_none() {
                log::warn!("Unknown country of origin: {}", shipment.country_of_origin);
            }

            let mot = match shipment.mode_of_transport.parse::<ModeOfTransport>() {
                Ok(mode) => Some(mode.code()),
                Err(e) => {
                    log::warn!("{}", e);
                    None
                }
            };

            let rate = rates.get(shipment.shipping_date, &settings.currency);
            if rate.is_none() {
                log::warn!(
                    "No {} rate for shipping date {}",
                    settings.currency,
                    shipment.shipping_date
                );
            }

            let partner_vat = if shipment.is_b2c() {
                settings.b2c_vat_placeholder.clone()
            } else {
                shipment.partner_vat.trim().to_string()
            };

            DeclarationLine {
                cn8: normalize_query_code(&shipment.commodity_code),
                ship_to: shipment.ship_to.clone(),
                coo,
                mot,
                incoterms: shipment.incoterms.clone(),
                net: rate.map(|r| round2(shipment.net_eur * r)),
                mass: shipment.mass_grams / 1000.0,
                quantity: shipment.quantity,
                partner_vat,
                shipping_date: shipment.shipping_date,
            }
        })
        .collect::<Vec<_>>();

    log::info!(
        "Declaration built: {} lines, {} without {} amount",
        lines.len(),
        lines.iter().filter(|l| l.net.is_none()).count(),
        settings.currency
    );

    Ok(lines)
}

pub fn write_declaration_csv<W: Write>(lines: &[DeclarationLine], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for line in lines {
        writer.serialize(line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Distinct partner VAT numbers worth sending to VIES, in first-seen order.
/// Blank values and the B2C placeholder are skipped.
pub fn partner_vat_numbers(lines: &[DeclarationLine], placeholder: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .iter()
        .map(|line| line.partner_vat.trim())
        .filter(|vat| !vat.is_empty() && *vat != placeholder)
        .filter(|vat| seen.insert(vat.to_string()))
        .map(str::to_string)
        .collect()
}

/// Commodity codes of all lines, in query form
pub fn declared_codes(lines: &[DeclarationLine]) -> Vec<String> {
    let codes: Vec<&str> = lines.iter().map(|line| line.cn8.as_str()).collect();
    unique_query_codes(codes.as_slice())
}

/// Lookup-table status of every line's commodity code
pub fn check_codes_against_table(
    lines: &[DeclarationLine],
    table: &CommodityCodeTable,
) -> Vec<(String, CodeStatus)> {
    lines
        .iter()
        .map(|line| (line.cn8.clone(), table.check(&line.cn8)))
        .collect()
}
